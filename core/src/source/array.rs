use crate::model::RawHeader;
use crate::source::{check_range, RawDataSource, SourceResult};
use ndarray::{s, Array2};

/// In-memory source over an `nf x nt` array.
#[derive(Debug, Clone)]
pub struct ArraySource {
    header: RawHeader,
    data: Array2<f32>,
}

impl ArraySource {
    pub fn new(header: RawHeader, data: Array2<f32>) -> Self {
        Self { header, data }
    }
}

impl RawDataSource for ArraySource {
    fn header(&self) -> SourceResult<RawHeader> {
        Ok(self.header.clone())
    }

    fn nt(&self) -> usize {
        self.data.ncols()
    }

    fn read(&mut self, offset: usize, count: usize, _beam: Option<usize>) -> SourceResult<Array2<f32>> {
        check_range(offset, count, self.nt())?;
        Ok(self.data.slice(s![.., offset..offset + count]).to_owned())
    }
}
