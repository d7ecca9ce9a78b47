//! authload: drive an authentication/presence service with concurrent
//! signup, session start, and session ping traffic.

pub mod loadtest;
