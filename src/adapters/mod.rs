//! Adapters: concrete implementations of the hexagonal port traits, plus
//! the input sources that feed the event queue.
//!
//! | Adapter    | Implements    | Connects to                     |
//! |------------|---------------|---------------------------------|
//! | `gpio`     | ActuatorPort  | reject output pin               |
//! |            | (producer)    | presence sensor pin             |
//! | `log_sink` | EventSink     | process log output              |
//! | `mqtt`     | MessagingPort | plant MQTT broker (`rumqttc`)   |
//! | `scanner`  | (producer)    | keyboard-wedge scanner on stdin |
//! | `settings` | ConfigPort    | JSON settings file              |
//! | `signals`  | (producer)    | SIGINT / SIGTERM                |
//! | `timer`    | TimerPort     | deferred-callback thread        |

pub mod gpio;
pub mod log_sink;
pub mod mqtt;
pub mod scanner;
pub mod settings;
pub mod signals;
pub mod timer;
