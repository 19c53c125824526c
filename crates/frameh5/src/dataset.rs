//! Dataset handles: resolve a path, keep the describing messages, serve
//! reads.

use frameh5_format::chunked;
use frameh5_format::data_layout::DataLayout;
use frameh5_format::dataspace::Dataspace;
use frameh5_format::datatype::Datatype;
use frameh5_format::filter_pipeline::FilterPipeline;
use frameh5_format::message::{type_id, Message};
use frameh5_format::object_header::ObjectHeader;
use frameh5_format::path::{resolve, ResolvedPath};
use frameh5_format::H5Error;
use frameh5_filters::StandardDecoder;

use crate::error::Error;
use crate::file::File;

/// External links may chain master -> data file -> ...; anything deeper
/// than this is a cycle or a broken writer.
const MAX_EXTERNAL_HOPS: usize = 16;

/// A resolved dataset: the file that finally holds it plus its describing
/// messages.
#[derive(Debug)]
pub struct Dataset {
    file: File,
    dataspace: Dataspace,
    datatype: Datatype,
    layout: DataLayout,
    pipeline: Option<FilterPipeline>,
}

impl Dataset {
    /// Resolve `path` in `file`, hopping through external links.
    pub fn open(file: &File, path: &str) -> Result<Dataset, Error> {
        let mut file = file.clone();
        let mut path = path.to_owned();

        for _ in 0..MAX_EXTERNAL_HOPS {
            let sb = file.superblock().clone();
            let resolved = resolve(
                file.inner.window(),
                sb.root_object_header_address,
                &path,
                sb.size_of_offsets,
                sb.size_of_lengths,
            )?;
            match resolved {
                ResolvedPath::Object(addr) => {
                    return Dataset::from_header(file, addr, &path);
                }
                ResolvedPath::External {
                    filename,
                    object_path,
                } => {
                    let next = file.inner.directory().join(&filename);
                    file = File::open(next)?;
                    path = object_path;
                }
            }
        }
        Err(Error::TooManyRedirects(path))
    }

    fn from_header(file: File, addr: u64, path: &str) -> Result<Dataset, Error> {
        let sb = file.superblock().clone();
        let header = ObjectHeader::parse(
            file.inner.window(),
            addr,
            sb.size_of_offsets,
            sb.size_of_lengths,
        )?;

        let mut dataspace = None;
        let mut datatype = None;
        let mut layout = None;
        let mut pipeline = None;
        for raw in &header.messages {
            match raw.type_id {
                type_id::DATASPACE | type_id::DATATYPE | type_id::DATA_LAYOUT
                | type_id::FILTER_PIPELINE => {}
                _ => continue,
            }
            match Message::parse(raw, sb.size_of_offsets, sb.size_of_lengths)? {
                Message::Dataspace(ds) => dataspace = Some(ds),
                Message::Datatype(dt) => datatype = Some(dt),
                Message::DataLayout(dl) => layout = Some(dl),
                Message::FilterPipeline(fp) => pipeline = Some(fp),
                _ => {}
            }
        }

        match (dataspace, datatype, layout) {
            (Some(dataspace), Some(datatype), Some(layout)) => Ok(Dataset {
                file,
                dataspace,
                datatype,
                layout,
                pipeline,
            }),
            _ => Err(Error::NotADataset(path.to_owned())),
        }
    }

    /// Current extent per axis; empty for a scalar.
    pub fn dim(&self) -> &[u64] {
        &self.dataspace.dims
    }

    /// 0 for integer elements, 1 for floating point.
    pub fn data_type_id(&self) -> u8 {
        self.datatype.type_id()
    }

    /// Element size in bytes.
    pub fn data_size(&self) -> u32 {
        self.datatype.size()
    }

    /// Whether integer elements are signed.
    pub fn is_signed(&self) -> bool {
        self.datatype.is_signed()
    }

    /// Whether the dataset uses chunked storage.
    pub fn is_chunked(&self) -> bool {
        matches!(self.layout, DataLayout::Chunked { .. })
    }

    /// Spatial chunk shape (element-size axis stripped); empty when not
    /// chunked.
    pub fn chunk_shape(&self) -> Vec<u64> {
        match &self.layout {
            DataLayout::Chunked { chunk_dims, .. } => chunk_dims
                [..chunk_dims.len().saturating_sub(1)]
                .iter()
                .map(|&d| d as u64)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Total byte size of the dataset's current extent.
    pub fn byte_size(&self) -> usize {
        self.dataspace.element_count() as usize * self.datatype.size() as usize
    }

    /// Byte size of one full chunk.
    pub fn chunk_byte_size(&self) -> usize {
        self.chunk_shape().iter().product::<u64>() as usize * self.data_size() as usize
    }

    /// Read the whole dataset into `dst` (`byte_size()` bytes).
    ///
    /// Contiguous and compact data is copied directly; chunked data is
    /// assembled chunk by chunk, clipping edge chunks to the extent.
    pub fn read(&self, dst: &mut [u8]) -> Result<(), Error> {
        if dst.len() != self.byte_size() {
            return Err(Error::Format(H5Error::BadArgument(
                "destination size mismatch",
            )));
        }
        match &self.layout {
            DataLayout::Compact { .. } | DataLayout::Contiguous { .. } => {
                chunked::read_raw(self.file.inner.window(), &self.layout, dst)?;
                Ok(())
            }
            DataLayout::Chunked { chunk_dims, .. } => {
                let rank = chunk_dims.len() - 1;
                if self.dataspace.dims.len() != rank {
                    return Err(Error::Format(H5Error::BadArgument(
                        "chunk rank does not match dataspace",
                    )));
                }
                self.assemble_chunks(dst)
            }
        }
    }

    /// Read the single chunk at `origin` (spatial coordinates, chunk
    /// aligned) into `dst` (`chunk_byte_size()` bytes).
    pub fn read_chunk(&self, dst: &mut [u8], origin: &[u64]) -> Result<(), Error> {
        let sb = self.file.superblock();
        chunked::read_chunk(
            self.file.inner.window(),
            &self.layout,
            self.pipeline.as_ref(),
            &StandardDecoder,
            origin,
            dst,
            sb.size_of_offsets,
        )?;
        Ok(())
    }

    /// Loop every chunk origin covering the extent, read it, and copy the
    /// in-bounds interior into place.
    fn assemble_chunks(&self, dst: &mut [u8]) -> Result<(), Error> {
        let dims: Vec<usize> = self.dataspace.dims.iter().map(|&d| d as usize).collect();
        let chunk: Vec<usize> = self.chunk_shape().iter().map(|&d| d as usize).collect();
        let rank = dims.len();
        let elem = self.data_size() as usize;

        let mut scratch = vec![0u8; self.chunk_byte_size()];
        let counts: Vec<usize> = dims
            .iter()
            .zip(&chunk)
            .map(|(&d, &c)| d.div_ceil(c.max(1)))
            .collect();
        let total_chunks: usize = counts.iter().product();

        for linear in 0..total_chunks {
            // linear index -> chunk grid coordinate -> element origin
            let mut rem = linear;
            let mut origin = vec![0u64; rank];
            for axis in (0..rank).rev() {
                origin[axis] = ((rem % counts[axis]) * chunk[axis]) as u64;
                rem /= counts[axis];
            }
            self.read_chunk(&mut scratch, &origin)?;
            copy_interior(&scratch, dst, &origin, &chunk, &dims, elem);
        }
        Ok(())
    }
}

/// Copy the in-bounds rows of one chunk into the output array.
fn copy_interior(
    chunk_data: &[u8],
    dst: &mut [u8],
    origin: &[u64],
    chunk: &[usize],
    dims: &[usize],
    elem: usize,
) {
    let rank = dims.len();
    if rank == 0 {
        dst.copy_from_slice(&chunk_data[..dst.len()]);
        return;
    }

    // strides in elements
    let mut dst_stride = vec![1usize; rank];
    let mut src_stride = vec![1usize; rank];
    for axis in (0..rank.saturating_sub(1)).rev() {
        dst_stride[axis] = dst_stride[axis + 1] * dims[axis + 1];
        src_stride[axis] = src_stride[axis + 1] * chunk[axis + 1];
    }

    // contiguous run along the last axis
    let last = rank - 1;
    let run = chunk[last].min(dims[last].saturating_sub(origin[last] as usize));
    if run == 0 {
        return;
    }
    let outer: usize = chunk[..last].iter().product();

    'rows: for row in 0..outer.max(1) {
        let mut rem = row;
        let mut src_off = 0usize;
        let mut dst_off = 0usize;
        for axis in (0..last).rev() {
            let coord = rem % chunk[axis];
            rem /= chunk[axis];
            let global = origin[axis] as usize + coord;
            if global >= dims[axis] {
                continue 'rows;
            }
            src_off += coord * src_stride[axis];
            dst_off += global * dst_stride[axis];
        }
        dst_off += origin[last] as usize;
        let src_base = src_off * elem;
        let dst_base = dst_off * elem;
        dst[dst_base..dst_base + run * elem]
            .copy_from_slice(&chunk_data[src_base..src_base + run * elem]);
    }
}
