pub mod revocation_sweep;

pub use revocation_sweep::RevocationSweepWorker;
