pub mod export;

pub mod portal;

pub mod ratio;

pub mod side;

pub mod snapshot;
