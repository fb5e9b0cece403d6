//! Machine configuration.
//!
//! Sizes and stack positions are given in words, so one configuration
//! describes the same layout for any word width.

use mite_common::Endianness;

/// Primary memory size used by [`MachineConfig::default`], in words.
pub const DEFAULT_MEMORY_WORDS: usize = 0x4_0000;

/// Largest capacity [`MachineConfig::new`] gives each stack, in words.
pub const DEFAULT_STACK_WORDS: usize = 1024;

/// Position and size of a stack inside primary memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackLayout {
    /// Index of the first word of the stack.
    pub base: usize,
    /// Number of words the stack can hold.
    pub capacity: usize,
}

impl StackLayout {
    pub fn new(base: usize, capacity: usize) -> Self {
        Self { base, capacity }
    }

    /// One past the last word of the stack.
    pub fn end(&self) -> usize {
        self.base.saturating_add(self.capacity)
    }

    pub(crate) fn overlaps(&self, other: &StackLayout) -> bool {
        self.base < other.end() && other.base < self.end()
    }
}

/// Everything needed to construct a machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineConfig {
    /// Size of the primary memory region in words.
    pub memory_words: usize,
    pub data_stack: StackLayout,
    pub return_stack: StackLayout,
    /// Byte order of words in memory.
    pub endianness: Endianness,
}

impl MachineConfig {
    /// A configuration with `memory_words` of memory and both stacks at the
    /// top of it, return stack highest.
    ///
    /// Each stack gets a quarter of memory, up to [`DEFAULT_STACK_WORDS`].
    pub fn new(memory_words: usize) -> Self {
        let capacity = (memory_words / 4).min(DEFAULT_STACK_WORDS);
        let return_base = memory_words - capacity;
        Self {
            memory_words,
            data_stack: StackLayout::new(return_base - capacity, capacity),
            return_stack: StackLayout::new(return_base, capacity),
            endianness: Endianness::native(),
        }
    }

    pub fn with_stacks(mut self, data_stack: StackLayout, return_stack: StackLayout) -> Self {
        self.data_stack = data_stack;
        self.return_stack = return_stack;
        self
    }

    pub fn with_endianness(mut self, endianness: Endianness) -> Self {
        self.endianness = endianness;
        self
    }
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_WORDS)
    }
}
