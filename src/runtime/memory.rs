//! Flat interpreter memory with frame-pointer and stack-pointer registers
//!
//! ```text
//! 0                    static data (globals), growing upward
//! static_top           first byte the stack may not cross
//!   ...                free
//! sp                   lowest live activation record
//! capacity·W           initial stack pointer
//! ```

use std::collections::BTreeMap;

use super::Value;
use crate::error::RuntimeError;
use crate::frame::WORD_SIZE;
use serde::Serialize;

/// Word-addressable memory region
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Memory {
    words: Vec<Value>,
    fp: i64,
    sp: i64,
    static_top: i64,
    labels: BTreeMap<String, i64>,
}

impl Memory {
    /// Creates a zero-filled memory of `capacity` words
    pub fn new(capacity: usize) -> Self {
        let top = capacity as i64 * WORD_SIZE;
        Memory {
            words: vec![Value::default(); capacity],
            fp: top,
            sp: top,
            static_top: 0,
            labels: BTreeMap::new(),
        }
    }

    /// Size of the memory in bytes
    pub fn size(&self) -> i64 {
        self.words.len() as i64 * WORD_SIZE
    }

    /// Frame-pointer register
    pub fn fp(&self) -> i64 {
        self.fp
    }

    /// Stack-pointer register
    pub fn sp(&self) -> i64 {
        self.sp
    }

    /// All memory words, lowest address first
    pub fn words(&self) -> &[Value] {
        &self.words
    }

    /// Address assigned to a static-data label
    pub fn label_address(&self, label: &str) -> Option<i64> {
        self.labels.get(label).copied()
    }

    /// Reserve `size` bytes of static data for `label`, returning its address
    pub fn allocate_static(&mut self, label: &str, size: i64) -> Result<i64, RuntimeError> {
        let size = round_up(size.max(0));
        let available = self.sp - self.static_top;
        if size > available {
            return Err(RuntimeError::OutOfMemory {
                requested: size,
                available,
            });
        }
        let address = self.static_top;
        self.static_top += size;
        self.labels.insert(label.to_string(), address);
        Ok(address)
    }

    /// Allocate a zero-filled activation record of `size` bytes below the
    /// stack pointer. Registers are updated; the new frame pointer is returned.
    pub fn push_frame(&mut self, size: i64) -> Result<i64, RuntimeError> {
        let new_sp = self.sp - round_up(size.max(0));
        if new_sp < self.static_top {
            return Err(RuntimeError::StackOverflow {
                stack_pointer: new_sp,
            });
        }
        for address in (new_sp..self.sp).step_by(WORD_SIZE as usize) {
            self.store(address, Value::default())?;
        }
        self.sp = new_sp;
        self.fp = new_sp;
        Ok(new_sp)
    }

    /// Restore the caller's registers after a return
    pub fn restore(&mut self, fp: i64, sp: i64) {
        self.fp = fp;
        self.sp = sp;
    }

    /// Read the word at `address`
    pub fn load(&self, address: i64) -> Result<Value, RuntimeError> {
        let index = self.index(address)?;
        Ok(self.words[index].clone())
    }

    /// Write the word at `address`
    pub fn store(&mut self, address: i64, value: Value) -> Result<(), RuntimeError> {
        let index = self.index(address)?;
        self.words[index] = value;
        Ok(())
    }

    fn index(&self, address: i64) -> Result<usize, RuntimeError> {
        if address < 0 || address % WORD_SIZE != 0 || address >= self.size() {
            return Err(RuntimeError::InvalidAddress { address });
        }
        Ok((address / WORD_SIZE) as usize)
    }
}

fn round_up(bytes: i64) -> i64 {
    (bytes + WORD_SIZE - 1) / WORD_SIZE * WORD_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_data_grows_up_and_stack_grows_down() {
        let mut memory = Memory::new(16);
        assert_eq!(memory.allocate_static("x", WORD_SIZE).unwrap(), 0);
        assert_eq!(memory.allocate_static("a", 3 * WORD_SIZE).unwrap(), WORD_SIZE);
        assert_eq!(memory.label_address("a"), Some(WORD_SIZE));

        let fp = memory.push_frame(2 * WORD_SIZE).unwrap();
        assert_eq!(fp, 14 * WORD_SIZE);
        assert_eq!(memory.fp(), fp);
        assert_eq!(memory.sp(), fp);
    }

    #[test]
    fn test_frames_are_zero_filled() {
        let mut memory = Memory::new(4);
        let top = memory.size();
        let fp = memory.push_frame(WORD_SIZE).unwrap();
        memory.store(fp, Value::Int(7)).unwrap();
        memory.restore(top, top);
        let fp = memory.push_frame(WORD_SIZE).unwrap();
        assert_eq!(memory.load(fp).unwrap(), Value::Int(0));
    }

    #[test]
    fn test_stack_cannot_cross_static_data() {
        let mut memory = Memory::new(4);
        memory.allocate_static("g", 2 * WORD_SIZE).unwrap();
        memory.push_frame(2 * WORD_SIZE).unwrap();
        assert!(matches!(
            memory.push_frame(WORD_SIZE),
            Err(RuntimeError::StackOverflow { .. })
        ));
        assert!(matches!(
            memory.allocate_static("h", WORD_SIZE),
            Err(RuntimeError::OutOfMemory { available: 0, .. })
        ));
    }

    #[test]
    fn test_misaligned_and_out_of_range_addresses() {
        let mut memory = Memory::new(2);
        assert_eq!(
            memory.load(1),
            Err(RuntimeError::InvalidAddress { address: 1 })
        );
        assert!(memory.store(2 * WORD_SIZE, Value::Int(1)).is_err());
        assert!(memory.load(-WORD_SIZE).is_err());
    }
}
