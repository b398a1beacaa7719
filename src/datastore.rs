// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The slave/server datastore contract consumed by [`crate::frame::Request::execute`].
//!
//! Four independent address spaces (discrete inputs, coils, input registers,
//! holding registers) are exposed through a single [`SlaveContext`] trait so
//! that request execution never needs to know which concrete storage backs a
//! function code, only which of the four spaces it addresses.

use std::collections::HashMap;

use thiserror::Error;

/// The four register spaces a [`SlaveContext`] routes requests to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Space {
    Discretes,
    Coils,
    InputRegisters,
    HoldingRegisters,
}

/// Errors raised by the datastore contract itself (not by a PDU's range
/// validation, which maps to a Modbus exception instead).
#[derive(Debug, Error)]
pub enum DatastoreError {
    #[error("invalid parameter: {0}")]
    Parameter(String),
}

/// A single bit-addressed or word-addressed data block.
pub trait DataBlock<T> {
    /// Returns `true` when every index in `[addr, addr + count)` is both
    /// in range and present, and `count > 0`.
    fn validate(&self, addr: u16, count: u16) -> bool;

    /// Returns the values at `[addr, addr + count)`. Only called after
    /// `validate` succeeded.
    fn get(&self, addr: u16, count: u16) -> Vec<T>;

    /// Overwrites the values starting at `addr`. Only called after
    /// `validate` succeeded for `values.len()`.
    fn set(&mut self, addr: u16, values: &[T]);

    /// Resets every value to its default.
    fn reset(&mut self);
}

/// A contiguous data block backed by a `Vec`, addressed from `start_addr`.
#[derive(Debug, Clone)]
pub struct SequentialDataBlock<T> {
    start_addr: u16,
    values: Vec<T>,
    default: T,
}

impl<T: Clone> SequentialDataBlock<T> {
    pub fn new(start_addr: u16, values: Vec<T>) -> Self
    where
        T: Default,
    {
        Self {
            start_addr,
            values,
            default: T::default(),
        }
    }
}

impl<T: Clone> DataBlock<T> for SequentialDataBlock<T> {
    fn validate(&self, addr: u16, count: u16) -> bool {
        if count == 0 {
            return false;
        }
        let Some(end) = addr.checked_add(count) else {
            return false;
        };
        let block_end = self.start_addr as u32 + self.values.len() as u32;
        self.start_addr <= addr && (end as u32) <= block_end
    }

    fn get(&self, addr: u16, count: u16) -> Vec<T> {
        let offset = (addr - self.start_addr) as usize;
        self.values[offset..offset + count as usize].to_vec()
    }

    fn set(&mut self, addr: u16, values: &[T]) {
        let offset = (addr - self.start_addr) as usize;
        self.values[offset..offset + values.len()].clone_from_slice(values);
    }

    fn reset(&mut self) {
        let default = self.default.clone();
        self.values.iter_mut().for_each(|v| *v = default.clone());
    }
}

/// A data block backed by a sparse map of individually-present addresses.
#[derive(Debug, Clone, Default)]
pub struct SparseDataBlock<T> {
    values: HashMap<u16, T>,
    initial: HashMap<u16, T>,
}

impl<T: Clone> SparseDataBlock<T> {
    pub fn new(values: HashMap<u16, T>) -> Self {
        Self {
            initial: values.clone(),
            values,
        }
    }
}

impl<T: Clone> DataBlock<T> for SparseDataBlock<T> {
    fn validate(&self, addr: u16, count: u16) -> bool {
        if count == 0 {
            return false;
        }
        (addr..).take(count as usize).all(|a| self.values.contains_key(&a))
    }

    fn get(&self, addr: u16, count: u16) -> Vec<T> {
        (addr..)
            .take(count as usize)
            .map(|a| self.values[&a].clone())
            .collect()
    }

    fn set(&mut self, addr: u16, values: &[T]) {
        for (i, value) in values.iter().enumerate() {
            self.values.insert(addr + i as u16, value.clone());
        }
    }

    fn reset(&mut self) {
        self.values = self.initial.clone();
    }
}

/// A single slave's four register spaces, routed to by function code.
pub struct SlaveContext {
    pub discretes: Box<dyn DataBlock<bool> + Send>,
    pub coils: Box<dyn DataBlock<bool> + Send>,
    pub input_registers: Box<dyn DataBlock<u16> + Send>,
    pub holding_registers: Box<dyn DataBlock<u16> + Send>,
}

impl SlaveContext {
    pub fn reset(&mut self) {
        self.discretes.reset();
        self.coils.reset();
        self.input_registers.reset();
        self.holding_registers.reset();
    }

    pub(crate) fn validate_bits(&self, space: Space, addr: u16, count: u16) -> bool {
        match space {
            Space::Discretes => self.discretes.validate(addr, count),
            Space::Coils => self.coils.validate(addr, count),
            _ => false,
        }
    }

    pub(crate) fn validate_words(&self, space: Space, addr: u16, count: u16) -> bool {
        match space {
            Space::InputRegisters => self.input_registers.validate(addr, count),
            Space::HoldingRegisters => self.holding_registers.validate(addr, count),
            _ => false,
        }
    }

    pub(crate) fn get_bits(&self, space: Space, addr: u16, count: u16) -> Vec<bool> {
        match space {
            Space::Discretes => self.discretes.get(addr, count),
            Space::Coils => self.coils.get(addr, count),
            _ => Vec::new(),
        }
    }

    pub(crate) fn set_bits(&mut self, space: Space, addr: u16, values: &[bool]) {
        match space {
            Space::Discretes => self.discretes.set(addr, values),
            Space::Coils => self.coils.set(addr, values),
            _ => {}
        }
    }

    pub(crate) fn get_words(&self, space: Space, addr: u16, count: u16) -> Vec<u16> {
        match space {
            Space::InputRegisters => self.input_registers.get(addr, count),
            Space::HoldingRegisters => self.holding_registers.get(addr, count),
            _ => Vec::new(),
        }
    }

    pub(crate) fn set_words(&mut self, space: Space, addr: u16, values: &[u16]) {
        match space {
            Space::InputRegisters => self.input_registers.set(addr, values),
            Space::HoldingRegisters => self.holding_registers.set(addr, values),
            _ => {}
        }
    }
}

impl std::fmt::Debug for SlaveContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlaveContext").finish_non_exhaustive()
    }
}

/// Routes a unit id to a [`SlaveContext`], either per-unit or shared by all
/// units (`single` mode).
#[derive(Debug)]
pub enum ServerContext {
    Single(SlaveContext),
    Multi(HashMap<u8, SlaveContext>),
}

impl ServerContext {
    pub fn single(ctx: SlaveContext) -> Self {
        Self::Single(ctx)
    }

    pub fn multi(contexts: HashMap<u8, SlaveContext>) -> Self {
        Self::Multi(contexts)
    }

    pub fn get(&self, unit_id: u8) -> Result<&SlaveContext, DatastoreError> {
        match self {
            Self::Single(ctx) => Ok(ctx),
            Self::Multi(map) => map
                .get(&unit_id)
                .ok_or_else(|| DatastoreError::Parameter(format!("unknown unit id {unit_id}"))),
        }
    }

    pub fn get_mut(&mut self, unit_id: u8) -> Result<&mut SlaveContext, DatastoreError> {
        match self {
            Self::Single(ctx) => Ok(ctx),
            Self::Multi(map) => map
                .get_mut(&unit_id)
                .ok_or_else(|| DatastoreError::Parameter(format!("unknown unit id {unit_id}"))),
        }
    }

    /// Removes a unit context. Always fails in `single` mode.
    pub fn remove(&mut self, unit_id: u8) -> Result<SlaveContext, DatastoreError> {
        match self {
            Self::Single(_) => Err(DatastoreError::Parameter(
                "cannot remove a unit from a single-context server".to_owned(),
            )),
            Self::Multi(map) => map
                .remove(&unit_id)
                .ok_or_else(|| DatastoreError::Parameter(format!("unknown unit id {unit_id}"))),
        }
    }
}
