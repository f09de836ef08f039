//! Candidate lists as CSV with a `t0,dm,snr,wbin[,beam]` header row.

use anyhow::{bail, Context};
use candycore::Candidate;
use std::path::Path;

pub fn load_candidates(path: &Path, default_beam: Option<usize>) -> anyhow::Result<Vec<Candidate>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening candidate list {}", path.display()))?;

    let mut candidates = Vec::new();
    for (row_no, result) in reader.deserialize::<Candidate>().enumerate() {
        let mut candidate =
            result.with_context(|| format!("{}: candidate row {}", path.display(), row_no + 1))?;
        if candidate.beam.is_none() {
            candidate.beam = default_beam;
        }
        candidates.push(candidate);
    }
    if candidates.is_empty() {
        bail!("candidate list {} is empty", path.display());
    }
    Ok(candidates)
}

pub fn write_candidates(path: &Path, candidates: &[Candidate]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating candidate list {}", path.display()))?;
    for candidate in candidates {
        writer
            .serialize(candidate)
            .with_context(|| format!("writing candidate {}", candidate.id()))?;
    }
    writer.flush().context("flushing candidate list")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn beam_column_is_optional() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"t0,dm,snr,wbin\n10.0,100.0,12.0,4\n2.5,56.1,8.0,16\n")
            .unwrap();
        let candidates = load_candidates(temp.path(), Some(2)).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0], Candidate::new(10.0, 100.0, 12.0, 4).with_beam(2));
        assert_eq!(candidates[1].wbin, 16);
    }

    #[test]
    fn written_list_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("candidates.csv");
        let written = vec![
            Candidate::new(1.0, 10.0, 7.0, 2),
            Candidate::new(3.0, 30.0, 9.5, 8).with_beam(1),
        ];
        write_candidates(&path, &written).unwrap();
        assert_eq!(load_candidates(&path, None).unwrap(), written);
    }

    #[test]
    fn malformed_row_names_its_line() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"t0,dm,snr,wbin\n10.0,abc,12.0,4\n").unwrap();
        let err = load_candidates(temp.path(), None).unwrap_err();
        assert!(format!("{:#}", err).contains("candidate row 1"));
    }
}
