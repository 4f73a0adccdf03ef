pub mod enums;
pub mod gate;
pub mod gateway;
pub mod identity;
pub mod routes;
