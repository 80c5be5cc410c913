//! Shared test harness modules for the geosurvey CLI.

use super::*;

mod commands;
mod helpers;
