pub mod areas;
pub mod backup;
pub mod core;
pub mod crimes;
pub mod import;
pub mod offences;
pub mod states;
