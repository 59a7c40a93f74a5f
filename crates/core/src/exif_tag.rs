use crate::offset::DateOffset;
use chrono::{Datelike, NaiveDateTime, Timelike};
use crc::{Crc, CRC_32_ISO_HDLC};
use exif::experimental::Writer;
use exif::{Exif, Field, In, Reader, Tag, Value};
use std::io::{self, Cursor};
use std::ops::Range;
use std::path::Path;
use thiserror::Error;

/// EXIF DateTimeOriginal.
pub const DATE_TAKEN_TAG: u16 = 0x9003;

const TAG_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

const JPEG_SOI: &[u8] = &[0xFF, 0xD8];
const JPEG_APP1: u8 = 0xE1;
const JPEG_SOS: u8 = 0xDA;
const JPEG_EOI: u8 = 0xD9;
const JPEG_EXIF_HEADER: &[u8] = b"Exif\0\0";
const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
const PNG_EXIF_CHUNK: &[u8] = b"eXIf";
const PNG_END_CHUNK: &[u8] = b"IEND";
const GIF_SIGNATURES: &[&[u8]] = &[b"GIF87a", b"GIF89a"];

const PNG_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

#[derive(Debug, Error)]
pub enum TagError {
    #[error("画像を読めませんでした")]
    Io(#[from] io::Error),
    #[error("画像形式を判別できません")]
    UnknownFormat,
    #[error("画像構造が壊れています: {0}")]
    Corrupt(&'static str),
    #[error("EXIFを解析できませんでした")]
    Exif(#[from] exif::Error),
    #[error("撮影日時の形式が不正です: {0:?}")]
    Malformed(String),
    #[error("EXIFが大きすぎて書き戻せません: {0} bytes")]
    TooLarge(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Jpeg,
    Png,
    Gif,
}

/// Location of an EXIF payload inside its container.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ExifBlock {
    segment: Range<usize>,
    tiff: Range<usize>,
}

pub fn is_tag_image(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy();
            TAG_IMAGE_EXTENSIONS
                .iter()
                .any(|candidate| ext.eq_ignore_ascii_case(candidate))
        })
        .unwrap_or(false)
}

/// Reads the date-taken tag. `Ok(None)` when the image carries no EXIF
/// block or the block has no such tag.
pub fn read_date_taken(bytes: &[u8]) -> Result<Option<NaiveDateTime>, TagError> {
    let container = detect_container(bytes)?;
    let Some(block) = locate_exif(bytes, container)? else {
        return Ok(None);
    };
    let exif = Reader::new().read_raw(bytes[block.tiff].to_vec())?;
    match find_date_taken(&exif) {
        Some(field) => parse_date_taken(&ascii_value(&field.value)?).map(Some),
        None => Ok(None),
    }
}

/// Rewrites the date-taken tag and re-serializes the EXIF block.
///
/// Returns the input unchanged when the tag does not exist; a new tag is
/// never added. Fields the EXIF writer cannot express are dropped.
pub fn write_date_taken(bytes: &[u8], taken: NaiveDateTime) -> Result<Vec<u8>, TagError> {
    let container = detect_container(bytes)?;
    let Some(block) = locate_exif(bytes, container)? else {
        return Ok(bytes.to_vec());
    };
    let exif = Reader::new().read_raw(bytes[block.tiff.clone()].to_vec())?;
    if find_date_taken(&exif).is_none() {
        return Ok(bytes.to_vec());
    }

    // The writer appends the NUL terminator to every ASCII value.
    let replacement = Field {
        tag: Tag::DateTimeOriginal,
        ifd_num: In::PRIMARY,
        value: Value::Ascii(vec![format_date_taken(taken).into_bytes()]),
    };
    let thumbnail = thumbnail_jpeg(&exif);

    let mut writer = Writer::new();
    for field in exif.fields() {
        if is_date_taken(field) {
            writer.push_field(&replacement);
        } else if is_rewritable(field) {
            writer.push_field(field);
        }
    }
    if let Some(jpeg) = thumbnail {
        writer.set_jpeg(jpeg, In::THUMBNAIL);
    }

    let mut tiff = Cursor::new(Vec::new());
    writer.write(&mut tiff, exif.little_endian())?;
    splice_exif(bytes, container, &block, &tiff.into_inner())
}

pub fn format_date_taken(taken: NaiveDateTime) -> String {
    format!(
        "{}:{}:{} {}:{}:{}",
        taken.year(),
        taken.month(),
        taken.day(),
        taken.hour(),
        taken.minute(),
        taken.second()
    )
}

/// Parses `Y:M:D h:m:s`; components need not be zero padded.
pub fn parse_date_taken(raw: &str) -> Result<NaiveDateTime, TagError> {
    let malformed = || TagError::Malformed(raw.to_string());
    let mut values = [0i32; 6];
    let mut parts = raw.trim_end_matches('\0').split([':', ' ']);
    for slot in values.iter_mut() {
        let part = parts.next().ok_or_else(malformed)?;
        *slot = part.parse().map_err(|_| malformed())?;
    }

    let [years, months, days, hours, minutes, seconds] = values;
    DateOffset {
        years,
        months,
        days,
        hours,
        minutes,
        seconds,
    }
    .to_absolute()
    .map_err(|_| malformed())
}

fn find_date_taken(exif: &Exif) -> Option<&Field> {
    exif.fields().find(|field| is_date_taken(field))
}

fn is_date_taken(field: &Field) -> bool {
    field.tag.number() == DATE_TAKEN_TAG && field.ifd_num == In::PRIMARY
}

fn ascii_value(value: &Value) -> Result<String, TagError> {
    match value {
        Value::Ascii(parts) => Ok(parts
            .first()
            .map(|part| String::from_utf8_lossy(part).to_string())
            .unwrap_or_default()),
        other => Err(TagError::Malformed(format!("{other:?}"))),
    }
}

fn is_rewritable(field: &Field) -> bool {
    if matches!(field.value, Value::Unknown(..)) {
        return false;
    }
    // Pointers and data offsets are recomputed by the writer.
    !matches!(
        field.tag,
        Tag::ExifIFDPointer
            | Tag::GPSInfoIFDPointer
            | Tag::InteropIFDPointer
            | Tag::StripOffsets
            | Tag::StripByteCounts
            | Tag::TileOffsets
            | Tag::TileByteCounts
            | Tag::JPEGInterchangeFormat
            | Tag::JPEGInterchangeFormatLength
    )
}

fn thumbnail_jpeg(exif: &Exif) -> Option<&[u8]> {
    let offset = exif
        .get_field(Tag::JPEGInterchangeFormat, In::THUMBNAIL)?
        .value
        .get_uint(0)? as usize;
    let len = exif
        .get_field(Tag::JPEGInterchangeFormatLength, In::THUMBNAIL)?
        .value
        .get_uint(0)? as usize;
    exif.buf().get(offset..offset.checked_add(len)?)
}

fn detect_container(bytes: &[u8]) -> Result<Container, TagError> {
    if bytes.starts_with(JPEG_SOI) {
        Ok(Container::Jpeg)
    } else if bytes.starts_with(PNG_SIGNATURE) {
        Ok(Container::Png)
    } else if GIF_SIGNATURES.iter().any(|sig| bytes.starts_with(sig)) {
        Ok(Container::Gif)
    } else {
        Err(TagError::UnknownFormat)
    }
}

fn locate_exif(bytes: &[u8], container: Container) -> Result<Option<ExifBlock>, TagError> {
    match container {
        Container::Jpeg => locate_jpeg_exif(bytes),
        Container::Png => locate_png_exif(bytes),
        Container::Gif => Ok(None),
    }
}

fn locate_jpeg_exif(bytes: &[u8]) -> Result<Option<ExifBlock>, TagError> {
    let mut pos = JPEG_SOI.len();
    loop {
        if bytes.get(pos) != Some(&0xFF) {
            return Err(TagError::Corrupt("JPEGマーカーが見つかりません"));
        }
        while bytes.get(pos + 1) == Some(&0xFF) {
            pos += 1;
        }
        let marker = *bytes
            .get(pos + 1)
            .ok_or(TagError::Corrupt("JPEGマーカーが途中で終わっています"))?;
        match marker {
            JPEG_SOS | JPEG_EOI => return Ok(None),
            0x01 | 0xD0..=0xD7 => {
                pos += 2;
                continue;
            }
            _ => {}
        }

        let len = read_u16_be(bytes, pos + 2)
            .ok_or(TagError::Corrupt("JPEGセグメント長を読めません"))? as usize;
        let start = pos + 4;
        let end = pos + 2 + len;
        if len < 2 || end > bytes.len() {
            return Err(TagError::Corrupt("JPEGセグメント長が不正です"));
        }
        if marker == JPEG_APP1 && bytes[start..end].starts_with(JPEG_EXIF_HEADER) {
            return Ok(Some(ExifBlock {
                segment: pos..end,
                tiff: start + JPEG_EXIF_HEADER.len()..end,
            }));
        }
        pos = end;
    }
}

fn locate_png_exif(bytes: &[u8]) -> Result<Option<ExifBlock>, TagError> {
    let mut pos = PNG_SIGNATURE.len();
    while pos + 8 <= bytes.len() {
        let len = read_u32_be(bytes, pos)
            .ok_or(TagError::Corrupt("PNGチャンク長を読めません"))? as usize;
        let kind = &bytes[pos + 4..pos + 8];
        let data_start = pos + 8;
        let chunk_end = data_start
            .checked_add(len)
            .and_then(|end| end.checked_add(4))
            .filter(|end| *end <= bytes.len())
            .ok_or(TagError::Corrupt("PNGチャンク長が不正です"))?;

        if kind == PNG_EXIF_CHUNK {
            return Ok(Some(ExifBlock {
                segment: pos..chunk_end,
                tiff: data_start..data_start + len,
            }));
        }
        if kind == PNG_END_CHUNK {
            return Ok(None);
        }
        pos = chunk_end;
    }
    Err(TagError::Corrupt("PNGの終端チャンクがありません"))
}

fn splice_exif(
    bytes: &[u8],
    container: Container,
    block: &ExifBlock,
    tiff: &[u8],
) -> Result<Vec<u8>, TagError> {
    let mut out = Vec::with_capacity(bytes.len() + tiff.len());
    out.extend_from_slice(&bytes[..block.segment.start]);
    match container {
        Container::Jpeg => {
            let seg_len = 2 + JPEG_EXIF_HEADER.len() + tiff.len();
            let seg_len = u16::try_from(seg_len).map_err(|_| TagError::TooLarge(seg_len))?;
            out.extend_from_slice(&[0xFF, JPEG_APP1]);
            out.extend_from_slice(&seg_len.to_be_bytes());
            out.extend_from_slice(JPEG_EXIF_HEADER);
            out.extend_from_slice(tiff);
        }
        Container::Png => {
            let len = u32::try_from(tiff.len()).map_err(|_| TagError::TooLarge(tiff.len()))?;
            let mut digest = PNG_CRC.digest();
            digest.update(PNG_EXIF_CHUNK);
            digest.update(tiff);
            out.extend_from_slice(&len.to_be_bytes());
            out.extend_from_slice(PNG_EXIF_CHUNK);
            out.extend_from_slice(tiff);
            out.extend_from_slice(&digest.finalize().to_be_bytes());
        }
        Container::Gif => return Ok(bytes.to_vec()),
    }
    out.extend_from_slice(&bytes[block.segment.end..]);
    Ok(out)
}

fn read_u16_be(bytes: &[u8], pos: usize) -> Option<u16> {
    let raw = bytes.get(pos..pos + 2)?;
    Some(u16::from_be_bytes([raw[0], raw[1]]))
}

fn read_u32_be(bytes: &[u8], pos: usize) -> Option<u32> {
    let raw = bytes.get(pos..pos + 4)?;
    Some(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
}
