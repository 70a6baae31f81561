#![deny(unsafe_code)]
#![deny(warnings)]
//! Named blob storage in the last internal flash sector
//!
//! Sector 11 (128 KB at `0x080E_0000`) is reserved for persisted blobs. The
//! sector holds a small table of fixed-size slots:
//!
//! ```text
//! | magic u32 LE | name hash u32 LE | len u32 LE | payload, padded to 8 |
//! ```
//!
//! Flash can only be cleared a sector at a time, so every write reads all
//! slots into RAM, updates one, erases the sector and programs the table
//! back. The erase blocks the CPU for up to two seconds; writes only happen
//! when the device set changes.

use defmt::{debug, Format};
use embassy_stm32::flash::{Blocking, Flash};
use thermonode_hal::BlobStore;

/// Offset of sector 11 from the start of flash
const SECTOR_OFFSET: u32 = 0xE_0000;
const SECTOR_SIZE: u32 = 128 * 1024;

const SLOT_MAGIC: u32 = 0x544E_4231; // "TNB1"
const SLOT_LEN: usize = 128;
const SLOT_COUNT: usize = 4;
const HEADER_LEN: usize = 12;
/// Largest payload a slot can hold
pub const MAX_BLOB_LEN: usize = SLOT_LEN - HEADER_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub enum FlashStoreError {
    /// Underlying flash read, erase or program failed
    Flash(embassy_stm32::flash::Error),
    /// No blob with that name
    NotFound,
    /// Payload or caller buffer does not fit
    TooLarge,
    /// Every slot is taken by another name
    Full,
}

impl From<embassy_stm32::flash::Error> for FlashStoreError {
    fn from(err: embassy_stm32::flash::Error) -> Self {
        FlashStoreError::Flash(err)
    }
}

/// FNV-1a over the blob name
fn name_hash(name: &str) -> u32 {
    name.bytes().fold(0x811C_9DC5, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(0x0100_0193)
    })
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(word)
}

pub struct FlashStore {
    flash: Flash<'static, Blocking>,
}

impl FlashStore {
    pub fn new(flash: Flash<'static, Blocking>) -> Self {
        Self { flash }
    }

    fn load_table(&mut self) -> Result<[u8; SLOT_LEN * SLOT_COUNT], FlashStoreError> {
        let mut table = [0u8; SLOT_LEN * SLOT_COUNT];
        self.flash.blocking_read(SECTOR_OFFSET, &mut table)?;
        Ok(table)
    }

    /// Index of the slot holding `hash`, if any
    fn find(table: &[u8], hash: u32) -> Option<usize> {
        table.chunks_exact(SLOT_LEN).position(|slot| {
            read_u32(&slot[0..4]) == SLOT_MAGIC && read_u32(&slot[4..8]) == hash
        })
    }

    fn find_free(table: &[u8]) -> Option<usize> {
        table
            .chunks_exact(SLOT_LEN)
            .position(|slot| read_u32(&slot[0..4]) != SLOT_MAGIC)
    }
}

impl BlobStore for FlashStore {
    type Error = FlashStoreError;

    fn read(&mut self, name: &str, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let table = self.load_table()?;
        let index = Self::find(&table, name_hash(name)).ok_or(FlashStoreError::NotFound)?;
        let slot = &table[index * SLOT_LEN..(index + 1) * SLOT_LEN];

        let len = read_u32(&slot[8..12]) as usize;
        if len > MAX_BLOB_LEN || len > buf.len() {
            return Err(FlashStoreError::TooLarge);
        }
        buf[..len].copy_from_slice(&slot[HEADER_LEN..HEADER_LEN + len]);
        Ok(len)
    }

    fn write(&mut self, name: &str, bytes: &[u8]) -> Result<(), Self::Error> {
        if bytes.len() > MAX_BLOB_LEN {
            return Err(FlashStoreError::TooLarge);
        }

        let hash = name_hash(name);
        let mut table = self.load_table()?;
        let index = Self::find(&table, hash)
            .or_else(|| Self::find_free(&table))
            .ok_or(FlashStoreError::Full)?;

        let slot = &mut table[index * SLOT_LEN..(index + 1) * SLOT_LEN];
        slot.fill(0xFF);
        slot[0..4].copy_from_slice(&SLOT_MAGIC.to_le_bytes());
        slot[4..8].copy_from_slice(&hash.to_le_bytes());
        slot[8..12].copy_from_slice(&(bytes.len() as u32).to_le_bytes());
        slot[HEADER_LEN..HEADER_LEN + bytes.len()].copy_from_slice(bytes);

        debug!("Erasing blob sector for {=str} ({} bytes)", name, bytes.len());
        self.flash
            .blocking_erase(SECTOR_OFFSET, SECTOR_OFFSET + SECTOR_SIZE)?;
        self.flash.blocking_write(SECTOR_OFFSET, &table)?;
        Ok(())
    }
}
