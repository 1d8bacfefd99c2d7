use std::error;
use std::fmt;
use std::ops::Range;

pub type Byte = u8; // 1 byte
pub type Half = u16; // 2 bytes
pub type Word = u32; // 4 bytes

/// Size of the default memory in bytes
pub const MEMORY_SIZE: usize = 0x100;

/// Default memory
pub type StdMem = Memory<MEMORY_SIZE>;

/// Direction of a memory access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    Read,
    Write,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Read => f.write_str("read"),
            Access::Write => f.write_str("write"),
        }
    }
}

/// An access which does not fit into the memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryError {
    access: Access,
    address: Word,
    width: usize,
    capacity: usize,
}

impl MemoryError {
    pub fn access(&self) -> Access {
        self.access
    }

    pub fn address(&self) -> Word {
        self.address
    }

    pub fn width(&self) -> usize {
        self.width
    }
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} byte(s) at `0x{:08x}` is outside of memory (0x{:x} bytes)",
            self.access, self.width, self.address, self.capacity
        )
    }
}

impl error::Error for MemoryError {}

pub type Result<T, E = MemoryError> = std::result::Result<T, E>;

/// Emulates the flat data memory of the CPU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Memory<const S: usize> {
    /// The actual data of the memory
    pub data: [Byte; S],
}

impl<const S: usize> Default for Memory<S> {
    /// Initializes the memory
    fn default() -> Self {
        Memory { data: [0; S] }
    }
}

impl<const S: usize> Memory<S> {
    /// Returns the index range covered by an access of `width` bytes at
    /// `position`, or an error if any byte of it is outside of the memory.
    fn range(&self, access: Access, position: Word, width: usize) -> Result<Range<usize>> {
        let start = position as usize;
        match start.checked_add(width) {
            Some(end) if end <= S => Ok(start..end),
            _ => Err(MemoryError {
                access,
                address: position,
                width,
                capacity: S,
            }),
        }
    }

    fn read<const N: usize>(&self, position: Word) -> Result<[Byte; N]> {
        let range = self.range(Access::Read, position, N)?;
        let mut bytes = [0; N];
        bytes.copy_from_slice(&self.data[range]);
        Ok(bytes)
    }

    fn write<const N: usize>(&mut self, position: Word, bytes: [Byte; N]) -> Result<()> {
        let range = self.range(Access::Write, position, N)?;
        self.data[range].copy_from_slice(&bytes);
        Ok(())
    }

    /// Reads a byte from the memory
    pub fn read_byte(&self, position: Word) -> Result<Byte> {
        self.read::<1>(position).map(Byte::from_le_bytes)
    }

    /// Writes a byte to the memory
    pub fn write_byte(&mut self, position: Word, value: Byte) -> Result<()> {
        self.write(position, value.to_le_bytes())
    }

    /// Reads a halfword from the memory (little endian)
    pub fn read_half(&self, position: Word) -> Result<Half> {
        self.read::<2>(position).map(Half::from_le_bytes)
    }

    /// Writes a halfword to the memory (little endian)
    pub fn write_half(&mut self, position: Word, value: Half) -> Result<()> {
        self.write(position, value.to_le_bytes())
    }

    /// Reads a word from the memory (little endian)
    pub fn read_word(&self, position: Word) -> Result<Word> {
        self.read::<4>(position).map(Word::from_le_bytes)
    }

    /// Writes a word to the memory (little endian)
    pub fn write_word(&mut self, position: Word, value: Word) -> Result<()> {
        self.write(position, value.to_le_bytes())
    }

    /// Returns the first `len` bytes of the memory, or all of it if it is
    /// smaller.
    pub fn head(&self, len: usize) -> &[Byte] {
        &self.data[..len.min(S)]
    }
}
