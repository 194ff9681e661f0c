// External I/O operations module
pub mod dbus; // logind sleep/resume and clock change monitoring
pub mod lock; // Daemon lock file and signalling
pub mod signals; // Unix signal handling
