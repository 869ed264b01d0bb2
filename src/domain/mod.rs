pub mod event;
pub mod holder;
pub mod inventory;
pub mod booking;
pub mod payment;
pub mod ticket;

pub use event::*;
pub use holder::*;
pub use inventory::*;
pub use booking::*;
pub use payment::*;
pub use ticket::*;
