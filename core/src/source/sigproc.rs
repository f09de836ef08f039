//! Sigproc filterbank (`.fil`) backend.
//!
//! The file starts with `HEADER_START`, followed by keyword/value pairs and
//! `HEADER_END`. Each keyword is a length-prefixed string and the type of
//! its value is fixed by the keyword. Spectra follow, one per time sample,
//! `nchans` values each.

use crate::model::RawHeader;
use crate::source::{check_range, spectra_to_channels, RawDataSource, SourceError, SourceResult};
use log::debug;
use ndarray::ArrayView2;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

const MAX_KEYWORD_LEN: usize = 1024;

enum KeywordType {
    Int,
    Double,
    Text,
}

fn keyword_type(keyword: &str) -> Option<KeywordType> {
    match keyword {
        "telescope_id" | "machine_id" | "data_type" | "barycentric" | "pulsarcentric"
        | "nbits" | "nsamples" | "nchans" | "nifs" | "nbeams" | "ibeam" => Some(KeywordType::Int),
        "rawdatafile" | "source_name" => Some(KeywordType::Text),
        "az_start" | "za_start" | "src_raj" | "src_dej" | "tstart" | "tsamp" | "fch1"
        | "foff" | "refdm" | "period" => Some(KeywordType::Double),
        _ => None,
    }
}

fn read_string<R: Read>(reader: &mut R) -> SourceResult<String> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = i32::from_le_bytes(len_buf);
    if len < 0 || len as usize > MAX_KEYWORD_LEN {
        return Err(SourceError::BadHeader {
            field: "keyword".into(),
            reason: format!("length {} outside [0, {}]", len, MAX_KEYWORD_LEN),
        });
    }
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn read_i32<R: Read>(reader: &mut R) -> SourceResult<i32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

fn read_f64<R: Read>(reader: &mut R) -> SourceResult<f64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

fn parse_keywords<R: Read>(reader: &mut R) -> SourceResult<BTreeMap<String, Value>> {
    if read_string(reader)? != "HEADER_START" {
        return Err(SourceError::BadHeader {
            field: "HEADER_START".into(),
            reason: "file does not start with HEADER_START".into(),
        });
    }
    let mut fields = BTreeMap::new();
    loop {
        let keyword = read_string(reader)?;
        if keyword == "HEADER_END" {
            break;
        }
        let value = match keyword_type(&keyword) {
            Some(KeywordType::Int) => Value::from(read_i32(reader)?),
            Some(KeywordType::Double) => Value::from(read_f64(reader)?),
            Some(KeywordType::Text) => Value::from(read_string(reader)?),
            None => {
                return Err(SourceError::BadHeader {
                    field: keyword,
                    reason: "unknown sigproc keyword".into(),
                })
            }
        };
        fields.insert(keyword, value);
    }
    Ok(fields)
}

fn number(fields: &BTreeMap<String, Value>, key: &str) -> SourceResult<f64> {
    fields
        .get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| SourceError::MissingField(key.to_string()))
}

fn bytes_per_sample(nbits: u32) -> SourceResult<usize> {
    match nbits {
        8 | 16 | 32 => Ok(nbits as usize / 8),
        other => Err(SourceError::BadHeader {
            field: "nbits".into(),
            reason: format!("{} bits per sample not supported", other),
        }),
    }
}

fn decode(raw: &[u8], nbits: u32) -> Vec<f32> {
    match nbits {
        8 => raw.iter().map(|&b| b as f32).collect(),
        16 => raw
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]) as f32)
            .collect(),
        _ => raw
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    }
}

fn encode(value: f32, nbits: u32, out: &mut Vec<u8>) {
    match nbits {
        8 => out.push(value.round().clamp(0.0, u8::MAX as f32) as u8),
        16 => out.extend_from_slice(&(value.round().clamp(0.0, u16::MAX as f32) as u16).to_le_bytes()),
        _ => out.extend_from_slice(&value.to_le_bytes()),
    }
}

/// File-backed source reading blocks lazily from a sigproc filterbank.
pub struct SigprocSource {
    file: File,
    header: RawHeader,
    data_offset: u64,
    nt: usize,
    ascending: bool,
}

impl SigprocSource {
    pub fn open<P: AsRef<Path>>(path: P) -> SourceResult<Self> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);
        let fields = parse_keywords(&mut reader)?;
        let data_offset = reader.stream_position()?;
        let file = reader.into_inner();

        let nf = number(&fields, "nchans")? as usize;
        let nbits = number(&fields, "nbits")? as u32;
        let nifs = fields.get("nifs").and_then(Value::as_u64).unwrap_or(1);
        let fch1 = number(&fields, "fch1")?;
        let foff = number(&fields, "foff")?;
        let tsamp = number(&fields, "tsamp")?;

        if nf == 0 {
            return Err(SourceError::BadHeader {
                field: "nchans".into(),
                reason: "must be positive".into(),
            });
        }
        if nifs != 1 {
            return Err(SourceError::BadHeader {
                field: "nifs".into(),
                reason: format!("{} IF streams, only 1 supported", nifs),
            });
        }
        if foff == 0.0 {
            return Err(SourceError::BadHeader {
                field: "foff".into(),
                reason: "channel width is zero".into(),
            });
        }
        let bytes = bytes_per_sample(nbits)?;

        let ascending = foff > 0.0;
        let fh = if ascending {
            fch1 + (nf - 1) as f64 * foff
        } else {
            fch1
        };
        let mut header = RawHeader::from_top(fh, foff, tsamp, nf, nbits);
        header.tstart = fields.get("tstart").and_then(Value::as_f64);
        header.extras = fields;

        let data_len = file.metadata()?.len().saturating_sub(data_offset);
        let nt = (data_len / (nf * bytes) as u64) as usize;
        debug!(
            "opened {}: {} channels, {} samples, {} bits, fh={:.3} MHz",
            path.display(),
            nf,
            nt,
            nbits,
            header.fh
        );

        Ok(Self {
            file,
            header,
            data_offset,
            nt,
            ascending,
        })
    }
}

impl RawDataSource for SigprocSource {
    fn header(&self) -> SourceResult<RawHeader> {
        Ok(self.header.clone())
    }

    fn nt(&self) -> usize {
        self.nt
    }

    fn read(&mut self, offset: usize, count: usize, _beam: Option<usize>) -> SourceResult<ndarray::Array2<f32>> {
        check_range(offset, count, self.nt)?;
        let nf = self.header.nf;
        let bytes = bytes_per_sample(self.header.nbits)?;
        let start = self.data_offset + (offset * nf * bytes) as u64;
        self.file.seek(SeekFrom::Start(start))?;
        let mut raw = vec![0u8; count * nf * bytes];
        self.file.read_exact(&mut raw)?;
        spectra_to_channels(decode(&raw, self.header.nbits), count, nf, self.ascending)
    }
}

/// Writes sigproc filterbanks with the top of the band first.
pub struct SigprocWriter {
    writer: BufWriter<File>,
    nf: usize,
    nbits: u32,
}

impl SigprocWriter {
    pub fn create<P: AsRef<Path>>(path: P, header: &RawHeader, source_name: &str) -> SourceResult<Self> {
        bytes_per_sample(header.nbits)?;
        let mut writer = BufWriter::new(File::create(path)?);
        write_string(&mut writer, "HEADER_START")?;
        write_string(&mut writer, "source_name")?;
        write_string(&mut writer, source_name)?;
        write_int(&mut writer, "data_type", 1)?;
        write_int(&mut writer, "nchans", header.nf as i32)?;
        write_int(&mut writer, "nbits", header.nbits as i32)?;
        write_int(&mut writer, "nifs", 1)?;
        write_double(&mut writer, "fch1", header.fh)?;
        write_double(&mut writer, "foff", -header.df)?;
        write_double(&mut writer, "tsamp", header.dt)?;
        write_double(&mut writer, "tstart", header.tstart.unwrap_or(0.0))?;
        write_string(&mut writer, "HEADER_END")?;
        Ok(Self {
            writer,
            nf: header.nf,
            nbits: header.nbits,
        })
    }

    /// Appends an `nf x count` block of samples.
    pub fn write_block(&mut self, block: ArrayView2<'_, f32>) -> SourceResult<()> {
        if block.nrows() != self.nf {
            return Err(SourceError::Shape(format!(
                "block has {} channels, file has {}",
                block.nrows(),
                self.nf
            )));
        }
        let mut out = Vec::with_capacity(block.len() * 4);
        for spectrum in block.columns() {
            for &value in spectrum.iter() {
                encode(value, self.nbits, &mut out);
            }
        }
        self.writer.write_all(&out)?;
        Ok(())
    }

    pub fn finish(mut self) -> SourceResult<()> {
        self.writer.flush()?;
        Ok(())
    }
}

fn write_string<W: Write>(writer: &mut W, value: &str) -> std::io::Result<()> {
    writer.write_all(&(value.len() as i32).to_le_bytes())?;
    writer.write_all(value.as_bytes())
}

fn write_int<W: Write>(writer: &mut W, key: &str, value: i32) -> std::io::Result<()> {
    write_string(writer, key)?;
    writer.write_all(&value.to_le_bytes())
}

fn write_double<W: Write>(writer: &mut W, key: &str, value: f64) -> std::io::Result<()> {
    write_string(writer, key)?;
    writer.write_all(&value.to_le_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use tempfile::NamedTempFile;

    fn sample_header(nbits: u32) -> RawHeader {
        RawHeader::from_top(1500.0, 1.0, 1e-3, 8, nbits).with_tstart(60000.5)
    }

    #[test]
    fn written_file_reads_back_with_header() {
        let temp = NamedTempFile::new().unwrap();
        let header = sample_header(32);
        let data = Array2::from_shape_fn((8, 50), |(f, t)| (f * 1000 + t) as f32);

        let mut writer = SigprocWriter::create(temp.path(), &header, "FAKE").unwrap();
        writer.write_block(data.view()).unwrap();
        writer.finish().unwrap();

        let mut source = SigprocSource::open(temp.path()).unwrap();
        let read_header = source.header().unwrap();
        assert_eq!(source.nt(), 50);
        assert_eq!(read_header.nf, 8);
        assert_eq!(read_header.fh, 1500.0);
        assert_eq!(read_header.fl, 1493.0);
        assert_eq!(read_header.tstart, Some(60000.5));
        assert_eq!(read_header.extras["source_name"], "FAKE");

        let block = source.read(10, 5, None).unwrap();
        assert_eq!(block.dim(), (8, 5));
        assert_eq!(block[[3, 0]], 3010.0);
        assert_eq!(block[[7, 4]], 7014.0);
    }

    #[test]
    fn eight_bit_samples_are_decoded() {
        let temp = NamedTempFile::new().unwrap();
        let header = sample_header(8);
        let data = Array2::from_shape_fn((8, 4), |(f, t)| (f + t) as f32);
        let mut writer = SigprocWriter::create(temp.path(), &header, "FAKE").unwrap();
        writer.write_block(data.view()).unwrap();
        writer.finish().unwrap();

        let mut source = SigprocSource::open(temp.path()).unwrap();
        assert_eq!(source.read(0, 4, None).unwrap(), data);
    }

    #[test]
    fn reads_past_the_end_are_rejected() {
        let temp = NamedTempFile::new().unwrap();
        let mut writer = SigprocWriter::create(temp.path(), &sample_header(32), "FAKE").unwrap();
        writer.write_block(Array2::zeros((8, 4)).view()).unwrap();
        writer.finish().unwrap();

        let mut source = SigprocSource::open(temp.path()).unwrap();
        assert!(matches!(
            source.read(2, 4, None),
            Err(SourceError::OutOfRange { nt: 4, .. })
        ));
    }

    #[test]
    fn missing_header_marker_is_reported() {
        let mut temp = NamedTempFile::new().unwrap();
        write_string(&mut temp, "NOT_A_HEADER").unwrap();
        assert!(matches!(
            SigprocSource::open(temp.path()),
            Err(SourceError::BadHeader { .. })
        ));
    }
}
