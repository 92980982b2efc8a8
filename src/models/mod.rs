//! Data model types (§3). Each entity carries its invariants as constructor
//! validation and/or derived methods rather than relying on an ORM layer —
//! per the §9 redesign note, entities are passed between components by id,
//! never by graph reference.

mod search_definition;
mod flight_price;
mod scrape_health;
mod trip_plan;
mod trip_plan_match;
mod user_settings;
mod deal;
mod award;

pub use search_definition::*;
pub use flight_price::*;
pub use scrape_health::*;
pub use trip_plan::*;
pub use trip_plan_match::*;
pub use user_settings::*;
pub use deal::*;
pub use award::*;
