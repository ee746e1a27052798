// Copyright (c) 2024 Contributors to the membrane project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use core::fmt::Display;

use membrane_bb_container::fixed_string::{FixedString, FixedStringConversionError};

use crate::constants::SERVICE_IDENTIFIER_CAPACITY;

/// One identifier of a [`ServiceDescription`], stored inline so that the
/// description can live in shared memory.
pub type ServiceIdentifier = FixedString<SERVICE_IDENTIFIER_CAPACITY>;

/// Identifies a topic as the (service, instance, event) triple, the address
/// under which publishers offer and subscribers subscribe.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct ServiceDescription {
    service: ServiceIdentifier,
    instance: ServiceIdentifier,
    event: ServiceIdentifier,
}

impl ServiceDescription {
    pub fn new(
        service: &str,
        instance: &str,
        event: &str,
    ) -> Result<Self, FixedStringConversionError> {
        Ok(Self {
            service: ServiceIdentifier::from_str(service)?,
            instance: ServiceIdentifier::from_str(instance)?,
            event: ServiceIdentifier::from_str(event)?,
        })
    }

    pub fn service(&self) -> &ServiceIdentifier {
        &self.service
    }

    pub fn instance(&self) -> &ServiceIdentifier {
        &self.instance
    }

    pub fn event(&self) -> &ServiceIdentifier {
        &self.event
    }
}

impl Display for ServiceDescription {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}/{}", self.service, self.instance, self.event)
    }
}
