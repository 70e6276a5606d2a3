//! Infrastructure layer - stores, external collaborators and the membership service

pub mod billing;
pub mod logging;
pub mod notification;
pub mod observability;
pub mod storage;
pub mod team;
