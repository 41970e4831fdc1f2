pub mod mot;
pub mod vehicle;
