pub mod apartment;
pub mod counter;
pub mod reading;
pub mod serde_time;
pub mod user;

pub use apartment::{Address, Apartment, ApartmentId};
pub use counter::{Counter, CounterId, CounterStatus, MediumType};
pub use reading::{NewReading, Reading, ReadingId};
pub use user::{LoginResponse, User};
