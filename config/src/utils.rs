// Copyright (c) FluxForge Contributors
// SPDX-License-Identifier: Apache-2.0

//! Small helpers shared across config structs, mirroring the role of the
//! teacher's own `config::utils` module (there: port allocation for tests;
//! here: duration (de)serialization, since `std::time::Duration` has no
//! built-in serde impl and every timing knob in this config is a duration).

use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

pub mod duration_secs {
    use super::*;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs_f64(f64::deserialize(d)?))
    }
}

pub mod duration_millis {
    use super::*;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
