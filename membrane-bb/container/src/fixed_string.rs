// Copyright (c) 2024 Contributors to the membrane project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use core::fmt::{Debug, Display};
use core::hash::{Hash, Hasher};

use membrane_bb_elementary::enum_gen;
use membrane_log::fail;

enum_gen! {
    FixedStringConversionError
  entry:
    ExceedsCapacity
}

/// A string with a compile time fixed capacity and inline storage, used for
/// names that must live in shared memory. Contents are always valid UTF-8
/// since the only way in is from a `&str`.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct FixedString<const CAPACITY: usize> {
    data: [u8; CAPACITY],
    len: usize,
}

impl<const CAPACITY: usize> Default for FixedString<CAPACITY> {
    fn default() -> Self {
        Self {
            data: [0; CAPACITY],
            len: 0,
        }
    }
}

impl<const CAPACITY: usize> Debug for FixedString<CAPACITY> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "FixedString<{}> {{ \"{}\" }}", CAPACITY, self.as_str())
    }
}

impl<const CAPACITY: usize> Display for FixedString<CAPACITY> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl<const CAPACITY: usize> PartialEq for FixedString<CAPACITY> {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl<const CAPACITY: usize> Eq for FixedString<CAPACITY> {}

impl<const CAPACITY: usize> Hash for FixedString<CAPACITY> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state)
    }
}

impl<const CAPACITY: usize> TryFrom<&str> for FixedString<CAPACITY> {
    type Error = FixedStringConversionError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::from_str(value)
    }
}

impl<const CAPACITY: usize> FixedString<CAPACITY> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_str(value: &str) -> Result<Self, FixedStringConversionError> {
        if value.len() > CAPACITY {
            fail!(from "FixedString::from_str", with FixedStringConversionError::ExceedsCapacity,
                "The string \"{}\" with a length of {} exceeds the capacity of {}.",
                value, value.len(), CAPACITY);
        }

        let mut new_self = Self::new();
        new_self.data[..value.len()].copy_from_slice(value.as_bytes());
        new_self.len = value.len();
        Ok(new_self)
    }

    pub const fn capacity(&self) -> usize {
        CAPACITY
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn as_str(&self) -> &str {
        // contents are copied from a &str, so they stay valid UTF-8
        unsafe { core::str::from_utf8_unchecked(self.as_bytes()) }
    }
}
