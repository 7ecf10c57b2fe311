//! Application core: domain orchestration, zero direct I/O.
//!
//! This module contains the command/event surface of the MicroBox
//! controller and the [`service::AppService`] that ties the config store,
//! scheduler and watering automation together.  All interaction with
//! hardware happens through **port traits** defined in [`ports`].

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
