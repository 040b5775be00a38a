// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Granule descriptors
//!
//! A descriptor is the read-mostly view of one granule handed to callers. It
//! is built per query from the store record and never persisted.

use std::sync::Arc;

use crate::footprint::MultiLevelRoi;
use crate::geometry::Envelope;
use crate::store::{Record, Value};

#[derive(Debug, Clone)]
pub struct GranuleDescriptor {
    record: Record,
    location: String,
    resolved_location: String,
    envelope: Envelope,
    suggested_format: Option<String>,
    suggested_reader: Option<String>,
    heterogeneous: bool,
    roi: Option<Arc<MultiLevelRoi>>,
}

impl GranuleDescriptor {
    pub fn new(
        record: Record,
        location: impl Into<String>,
        resolved_location: impl Into<String>,
        envelope: Envelope,
    ) -> Self {
        Self {
            record,
            location: location.into(),
            resolved_location: resolved_location.into(),
            envelope,
            suggested_format: None,
            suggested_reader: None,
            heterogeneous: false,
            roi: None,
        }
    }

    pub fn with_suggestions(mut self, format: Option<String>, reader: Option<String>) -> Self {
        self.suggested_format = format;
        self.suggested_reader = reader;
        self
    }

    pub fn with_heterogeneous(mut self, heterogeneous: bool) -> Self {
        self.heterogeneous = heterogeneous;
        self
    }

    pub fn with_roi(mut self, roi: Option<Arc<MultiLevelRoi>>) -> Self {
        self.roi = roi;
        self
    }

    /// Store-assigned identifier of the originating record
    pub fn id(&self) -> &str {
        &self.record.id
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.record.get(name)
    }

    /// Location as stored in the record
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Location after path resolution
    pub fn resolved_location(&self) -> &str {
        &self.resolved_location
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn suggested_format(&self) -> Option<&str> {
        self.suggested_format.as_deref()
    }

    pub fn suggested_reader(&self) -> Option<&str> {
        self.suggested_reader.as_deref()
    }

    pub fn is_heterogeneous(&self) -> bool {
        self.heterogeneous
    }

    pub fn roi(&self) -> Option<&Arc<MultiLevelRoi>> {
        self.roi.as_ref()
    }
}
