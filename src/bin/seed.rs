use boxoffice::{
    domain::{Event, Holder, Seat, Zone},
    repository::{
        EventRepository, HolderRepository, InventoryRepository,
        SqliteEventRepository, SqliteHolderRepository, SqliteInventoryRepository,
    },
};
use chrono::{Duration, NaiveTime, Utc};
use clap::Parser;
use fake::{
    faker::{internet::en::SafeEmail, name::en::{FirstName, LastName}},
    Fake,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use uuid::Uuid;

/// Seeds a development database with holders, an indoor event with a seat
/// grid, and an outdoor event split into zones.
#[derive(Parser, Debug)]
#[command(name = "seed", about = "Populate a Boxoffice database with sample data")]
struct Args {
    /// SQLite database URL
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://boxoffice.db")]
    database_url: String,

    /// Number of ticket holders to create
    #[arg(long, default_value_t = 5)]
    holders: usize,

    /// Seat rows in the indoor event (A, B, C, ...)
    #[arg(long, default_value_t = 6, value_parser = clap::value_parser!(u8).range(1..=26))]
    rows: u8,

    /// Seats per row in the indoor event
    #[arg(long, default_value_t = 12)]
    seats_per_row: i32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    println!("🌱 Starting database seeding...");

    let connect_options = SqliteConnectOptions::from_str(&args.database_url)?
        .create_if_missing(true);
    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options)
        .await?;

    // Run migrations first
    println!("📋 Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    let holder_repo = SqliteHolderRepository::new(db_pool.clone());
    let event_repo = SqliteEventRepository::new(db_pool.clone());
    let inventory_repo = SqliteInventoryRepository::new(db_pool.clone());

    println!("👥 Creating holders...");
    for _ in 0..args.holders {
        let holder = holder_repo.create(Holder {
            id: Uuid::new_v4(),
            first_name: FirstName().fake(),
            last_name: LastName().fake(),
            email: SafeEmail().fake(),
        }).await?;
        println!("  ✅ {} <{}> ({})", holder.full_name(), holder.email, holder.id);
    }

    let today = Utc::now().date_naive();

    println!("🎭 Creating indoor event...");
    let concert = event_repo.create(Event {
        id: Uuid::new_v4(),
        title: "Chamber Orchestra Evening".to_string(),
        venue_name: "Town Hall Auditorium".to_string(),
        is_indoor: true,
        is_published: true,
        start_date: today + Duration::days(14),
        end_date: today + Duration::days(14),
        start_time: NaiveTime::from_hms_opt(19, 30, 0).unwrap_or_default(),
        created_at: Utc::now(),
    }).await?;

    let mut seats = Vec::new();
    for row in 0..args.rows {
        let row_label = ((b'A' + row) as char).to_string();
        // Front rows are premium
        let (category, price_cents) = if row < 2 {
            ("Premium", 2500)
        } else {
            ("Standard", 1500)
        };
        for number in 1..=args.seats_per_row {
            seats.push(Seat {
                id: Uuid::new_v4(),
                event_id: concert.id,
                row: row_label.clone(),
                number,
                category: category.to_string(),
                price_cents,
                is_available: true,
            });
        }
    }
    let seats = inventory_repo.create_seats(seats).await?;
    println!("  ✅ {} ({}) with {} seats", concert.title, concert.id, seats.len());

    println!("🌳 Creating outdoor event...");
    let festival = event_repo.create(Event {
        id: Uuid::new_v4(),
        title: "Riverside Music Festival".to_string(),
        venue_name: "Riverside Park".to_string(),
        is_indoor: false,
        is_published: true,
        start_date: today + Duration::days(30),
        end_date: today + Duration::days(31),
        start_time: NaiveTime::from_hms_opt(16, 0, 0).unwrap_or_default(),
        created_at: Utc::now(),
    }).await?;

    for (name, description, capacity, price_cents) in [
        ("Front Stage", "Standing area next to the stage", 200, 4000),
        ("Lawn", "Open lawn, bring a blanket", 800, 2000),
        ("Hill", "Elevated seating with a view", 400, 1500),
    ] {
        let zone = inventory_repo.create_zone(Zone {
            id: Uuid::new_v4(),
            event_id: festival.id,
            name: name.to_string(),
            description: description.to_string(),
            capacity,
            price_cents,
        }).await?;
        println!("  ✅ Zone {} (capacity {})", zone.name, zone.capacity);
    }
    println!("  ✅ {} ({})", festival.title, festival.id);

    println!("🎉 Seeding complete!");
    Ok(())
}
