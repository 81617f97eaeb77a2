//! Snapshot derivation, detail projection and the mode controller.

pub mod controller;
pub mod derive;
pub mod projector;

#[cfg(test)]
mod test_properties;
