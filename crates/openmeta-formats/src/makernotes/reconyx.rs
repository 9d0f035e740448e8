//! Reconyx trail-camera MakerNote decoder.
//!
//! Three wire formats, identified by magic:
//! - `0x01 0xF1` - HyperFire: flat int16u table, tag ids are word indices
//! - `"RECONYXH2\0"` - HyperFire2: fixed-layout blob, tag ids are offsets
//! - `"RECONYXUF\0"` - UltraFire: fixed-layout blob with packed version
//!   fields
//!
//! All three are little-endian regardless of the outer TIFF.

use openmeta_core::{ByteOrder, MetaStore};

use super::util::{self, TagListBuilder};
use super::{MkTokens, NoteContext};
use crate::exif::{ExifDecodeOptions, ExifDecodeResult};

const LE: ByteOrder = ByteOrder::LittleEndian;

pub(crate) fn detect(ctx: &NoteContext<'_>) -> bool {
    let note = ctx.note();
    if note.len() < 4 {
        return false;
    }
    (note[0] == 0x01 && note[1] == 0xF1)
        || ctx.note_starts(b"RECONYXH2\0")
        || ctx.note_starts(b"RECONYXUF\0")
}

pub(crate) fn decode(
    ctx: &NoteContext<'_>,
    mk: &MkTokens,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) -> bool {
    let note = ctx.note();
    if note.len() < 4 {
        return false;
    }
    if note[0] == 0x01 && note[1] == 0xF1 {
        decode_hyperfire(note, &mk.subtable("hyperfire", 0), store, options, result)
    } else if ctx.note_starts(b"RECONYXH2\0") {
        decode_hyperfire2(note, &mk.subtable("hyperfire2", 0), store, options, result)
    } else if ctx.note_starts(b"RECONYXUF\0") {
        decode_ultrafire(note, &mk.subtable("ultrafire", 0), store, options, result)
    } else {
        false
    }
}

/// HyperFire: int16u words, tag id = word index.
fn decode_hyperfire(
    note: &[u8],
    ifd_name: &str,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) -> bool {
    let word = |idx: u16| u64::from(idx) * 2;
    let mut list = TagListBuilder::new();

    list.push(0x0000, util::u16_value(note, word(0x0000), LE)); // MakerNoteVersion
    list.push(0x0001, util::u16_array(store.arena_mut(), note, word(0x0001), 3, LE)); // FirmwareVersion
    list.push(0x0004, util::u16_array(store.arena_mut(), note, word(0x0004), 2, LE)); // FirmwareDate
    list.push(0x0006, util::ascii_text(store.arena_mut(), note, word(0x0006), 2)); // TriggerMode
    list.push(0x0007, util::u16_array(store.arena_mut(), note, word(0x0007), 2, LE)); // Sequence
    list.push(0x0009, util::u16_array(store.arena_mut(), note, word(0x0009), 2, LE)); // EventNumber
    list.push(0x000B, util::u16_array(store.arena_mut(), note, word(0x000B), 6, LE)); // DateTimeOriginal
    list.push(0x0012, util::u16_value(note, word(0x0012), LE)); // MoonPhase
    list.push(0x0013, util::i16_value(note, word(0x0013), LE)); // AmbientTemperatureFahrenheit
    list.push(0x0014, util::i16_value(note, word(0x0014), LE)); // AmbientTemperature
    list.push(0x0015, util::utf16le_text(store.arena_mut(), note, word(0x0015), 30)); // SerialNumber
    for tag in 0x0024..=0x0027u16 {
        // Contrast / Brightness / Sharpness / Saturation
        list.push(tag, util::u16_value(note, word(tag), LE));
    }
    list.push(0x0028, util::u16_value(note, word(0x0028), LE)); // InfraredIlluminator
    list.push(0x0029, util::u16_value(note, word(0x0029), LE)); // MotionSensitivity
    list.push(0x002A, util::u16_value(note, word(0x002A), LE)); // BatteryVoltage
    list.push(0x002B, util::ascii_text(store.arena_mut(), note, word(0x002B), 22)); // UserLabel

    list.emit(ifd_name, store, options, result)
}

/// HyperFire2: fixed-layout blob, tag id = byte offset.
fn decode_hyperfire2(
    note: &[u8],
    ifd_name: &str,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) -> bool {
    let mut list = TagListBuilder::new();

    list.push(0x0010, util::u16_value(note, 0x0010, LE)); // FileNumber
    list.push(0x0012, util::u16_value(note, 0x0012, LE)); // DirectoryNumber
    list.push(0x0014, util::u16_array(store.arena_mut(), note, 0x0014, 2, LE)); // FirmwareVersion
    list.push(0x002A, util::u16_array(store.arena_mut(), note, 0x002A, 3, LE)); // FirmwareDate
    list.push(0x0030, util::u16_array(store.arena_mut(), note, 0x0030, 2, LE));
    list.push(0x0034, util::ascii_text(store.arena_mut(), note, 0x0034, 2)); // TriggerMode
    list.push(0x0036, util::u16_array(store.arena_mut(), note, 0x0036, 2, LE)); // Sequence
    list.push(0x003A, util::u16_array(store.arena_mut(), note, 0x003A, 2, LE)); // EventNumber
    list.push(0x003E, util::u16_array(store.arena_mut(), note, 0x003E, 6, LE)); // DateTimeOriginal
    list.push(0x004A, util::u16_value(note, 0x004A, LE)); // DayOfWeek
    list.push(0x004C, util::u16_value(note, 0x004C, LE)); // MoonPhase
    list.push(0x004E, util::i16_value(note, 0x004E, LE)); // AmbientTemperatureFahrenheit
    list.push(0x0050, util::i16_value(note, 0x0050, LE)); // AmbientTemperature
    list.push(0x0052, util::u16_value(note, 0x0052, LE)); // Contrast
    list.push(0x0054, util::u16_value(note, 0x0054, LE)); // Brightness
    list.push(0x0056, util::u16_value(note, 0x0056, LE)); // Sharpness
    list.push(0x0058, util::u16_value(note, 0x0058, LE)); // Saturation
    list.push(0x005A, util::u16_value(note, 0x005A, LE)); // Flash
    list.push(0x005C, util::u16_value(note, 0x005C, LE)); // AmbientInfrared
    list.push(0x005E, util::u16_value(note, 0x005E, LE)); // AmbientLight
    list.push(0x0060, util::u16_value(note, 0x0060, LE)); // MotionSensitivity
    list.push(0x0062, util::u16_value(note, 0x0062, LE)); // BatteryVoltage
    list.push(0x0064, util::u16_value(note, 0x0064, LE)); // BatteryVoltageAvg
    list.push(0x0066, util::u16_value(note, 0x0066, LE)); // BatteryType
    list.push(0x0068, util::ascii_text(store.arena_mut(), note, 0x0068, 22)); // UserLabel
    list.push(0x007E, util::utf16le_text(store.arena_mut(), note, 0x007E, 30)); // SerialNumber

    list.emit(ifd_name, store, options, result)
}

/// UltraFire: fixed-layout blob with 7-byte packed version fields.
fn decode_ultrafire(
    note: &[u8],
    ifd_name: &str,
    store: &mut MetaStore,
    options: &ExifDecodeOptions,
    result: &mut ExifDecodeResult,
) -> bool {
    let mut list = TagListBuilder::new();

    list.push(0x0018, util::bytes_value(store.arena_mut(), note, 0x0018, 7)); // FirmwareVersion
    list.push(0x001F, util::bytes_value(store.arena_mut(), note, 0x001F, 7)); // Micro1Version
    list.push(0x0026, util::bytes_value(store.arena_mut(), note, 0x0026, 7)); // BootLoaderVersion
    list.push(0x002D, util::bytes_value(store.arena_mut(), note, 0x002D, 7)); // Micro2Version
    list.push(0x0034, util::ascii_text(store.arena_mut(), note, 0x0034, 1)); // TriggerMode
    list.push(0x0035, util::u8_array(store.arena_mut(), note, 0x0035, 2)); // Sequence
    list.push(0x0037, util::u32_value(note, 0x0037, LE)); // EventNumber
    list.push(0x003B, util::u8_array(store.arena_mut(), note, 0x003B, 7)); // DateTimeOriginal
    list.push(0x0042, util::u8_array(store.arena_mut(), note, 0x0042, 1)); // DayOfWeek
    list.push(0x0043, util::u8_array(store.arena_mut(), note, 0x0043, 1)); // MoonPhase
    list.push(0x0044, util::i16_value(note, 0x0044, LE)); // AmbientTemperatureFahrenheit
    list.push(0x0046, util::i16_value(note, 0x0046, LE)); // AmbientTemperature
    list.push(0x0048, util::u16_value(note, 0x0048, LE)); // Illumination
    list.push(0x0049, util::u16_value(note, 0x0049, LE)); // BatteryVoltage
    list.push(0x004B, util::ascii_text(store.arena_mut(), note, 0x004B, 15)); // SerialNumber
    list.push(0x005A, util::ascii_text(store.arena_mut(), note, 0x005A, 21)); // UserLabel

    list.emit(ifd_name, store, options, result)
}
