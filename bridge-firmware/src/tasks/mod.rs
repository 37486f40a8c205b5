// Task-Modul: Enthält alle Embassy Tasks
//
// Die Bridge läuft in einem einzigen Task, WiFi daneben.
// Bridge ↔ WiFi über den Netzwerk-Stack; Töne erzeugt die LEDC-Hardware.

pub mod bridge;
pub mod wifi;

// Re-export Tasks für einfachen Import
pub use bridge::bridge_task;
pub use wifi::{connection_task, net_task};
