//! The processing-pipeline plugin: four C entry points serving detector
//! frames as masked, overflow-clamped `i32` images.
//!
//! One file is open per process. Error codes on the C surface: `0` success,
//! `-2` usage error (no file open, frame out of range), `-3` unsupported
//! pixel datasize, `-4` parse or read failure. Every failure also prints a
//! one-line diagnostic to standard error.

use std::ffi::CStr;
use std::sync::Mutex;

use lazy_static::lazy_static;
use libc::{c_char, c_float, c_int};

use frameh5::{Dataset, Error, File};
use frameh5_format::ErrorKind;

const VENDOR_ID: c_int = 1;
const VERSION_MAJOR: c_int = 0;
const VERSION_MINOR: c_int = 3;
const VERSION_PATCH: c_int = 1;
const VERSION_TIMESTAMP: c_int = 0x6650_0000;

const ERR_USAGE: c_int = -2;
const ERR_DATASIZE: c_int = -3;
const ERR_READ: c_int = -4;

const PIXEL_SIZE_X: &str = "/entry/instrument/detector/x_pixel_size";
const PIXEL_SIZE_Y: &str = "/entry/instrument/detector/y_pixel_size";
const PIXEL_MASK: &str = "/entry/instrument/detector/detectorSpecific/pixel_mask";
const NIMAGES: &str = "/entry/instrument/detector/detectorSpecific/nimages";
const NTRIGGER: &str = "/entry/instrument/detector/detectorSpecific/ntrigger";

struct DataCache {
    file: File,
    filename: String,
    dimx: usize,
    dimy: usize,
    datasize: usize,
    frames_per_dataset: usize,
    number_of_frames: usize,
    master_only: bool,
    mask: Vec<i32>,
    x_pixel_size: f32,
    y_pixel_size: f32,
}

lazy_static! {
    static ref HANDLE: Mutex<Option<DataCache>> = Mutex::new(None);
}

#[derive(Debug)]
struct PluginError {
    code: c_int,
    message: String,
}

impl PluginError {
    fn new(code: c_int, message: impl Into<String>) -> PluginError {
        PluginError {
            code,
            message: message.into(),
        }
    }
}

impl From<Error> for PluginError {
    fn from(e: Error) -> PluginError {
        let code = match e.kind() {
            ErrorKind::Argument => ERR_USAGE,
            _ => ERR_READ,
        };
        PluginError::new(code, format!("PLUGIN ERROR: {e}"))
    }
}

fn fill_info(info: *mut c_int) {
    if info.is_null() {
        return;
    }
    // SAFETY: the contract hands us an int[1024]; only slots 0..4 are set.
    unsafe {
        *info.add(0) = VENDOR_ID;
        *info.add(1) = VERSION_MAJOR;
        *info.add(2) = VERSION_MINOR;
        *info.add(3) = VERSION_PATCH;
        *info.add(4) = VERSION_TIMESTAMP;
    }
}

fn report(result: Result<(), PluginError>, error_flag: *mut c_int) {
    let code = match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{}", e.message);
            e.code
        }
    };
    if !error_flag.is_null() {
        // SAFETY: caller-provided output slot.
        unsafe { *error_flag = code };
    }
}

// ---------------------------------------------------------------------------
// scalar helpers
// ---------------------------------------------------------------------------

/// Read a scalar integer dataset of any supported width, sign-extended,
/// and require it to be positive.
fn read_positive_uint(ds: &Dataset) -> Result<u64, PluginError> {
    if ds.data_type_id() != 0 {
        return Err(PluginError::new(
            ERR_READ,
            "PLUGIN ERROR: UNSUPPORTED DATATYPE FOR COUNTER",
        ));
    }
    let size = ds.data_size() as usize;
    let mut raw = [0u8; 8];
    if !matches!(size, 1 | 2 | 4 | 8) {
        return Err(PluginError::new(
            ERR_READ,
            "PLUGIN ERROR: UNSUPPORTED DATASIZE FOR COUNTER",
        ));
    }
    ds.read(&mut raw[..size]).map_err(PluginError::from)?;
    if ds.is_signed() {
        let value = match size {
            1 => raw[0] as i8 as i64,
            2 => i16::from_le_bytes(raw[..2].try_into().unwrap()) as i64,
            4 => i32::from_le_bytes(raw[..4].try_into().unwrap()) as i64,
            _ => i64::from_le_bytes(raw),
        };
        if value <= 0 {
            return Err(PluginError::new(
                ERR_READ,
                "PLUGIN ERROR: COUNTER ZERO OR NEGATIVE",
            ));
        }
        Ok(value as u64)
    } else {
        let value = match size {
            1 => raw[0] as u64,
            2 => u16::from_le_bytes(raw[..2].try_into().unwrap()) as u64,
            4 => u32::from_le_bytes(raw[..4].try_into().unwrap()) as u64,
            _ => u64::from_le_bytes(raw),
        };
        if value == 0 {
            return Err(PluginError::new(
                ERR_READ,
                "PLUGIN ERROR: COUNTER MUST BE NON-ZERO",
            ));
        }
        Ok(value)
    }
}

fn read_float_scalar(ds: &Dataset) -> Result<f64, PluginError> {
    if ds.data_type_id() != 1 {
        return Err(PluginError::new(
            ERR_READ,
            "PLUGIN ERROR: UNSUPPORTED DATATYPE FOR PIXEL SIZE",
        ));
    }
    match ds.data_size() {
        4 => {
            let mut raw = [0u8; 4];
            ds.read(&mut raw).map_err(PluginError::from)?;
            Ok(f32::from_le_bytes(raw) as f64)
        }
        8 => {
            let mut raw = [0u8; 8];
            ds.read(&mut raw).map_err(PluginError::from)?;
            Ok(f64::from_le_bytes(raw))
        }
        _ => Err(PluginError::new(
            ERR_READ,
            "PLUGIN ERROR: UNSUPPORTED DATASIZE FOR PIXEL SIZE",
        )),
    }
}

/// Pixel size is optional: absent datasets read as 0.0.
fn read_pixel_size(file: &File, path: &str) -> Result<f32, PluginError> {
    match file.dataset(path) {
        Ok(ds) => Ok(read_float_scalar(&ds)? as f32),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(0.0),
        Err(e) => Err(PluginError::from(e)),
    }
}

// ---------------------------------------------------------------------------
// pixel mask
// ---------------------------------------------------------------------------

/// Collapse the raw mask to per-pixel sentinels: bit 0 set means the pixel
/// is a gap (-1), bits 1-4 mean it is otherwise invalid (-2).
fn preprocess_mask(values: impl Iterator<Item = Result<u32, PluginError>>) -> Result<Vec<i32>, PluginError> {
    values
        .map(|v| {
            v.map(|raw| {
                if raw & 0x1 != 0 {
                    -1
                } else if raw & 0x1E != 0 {
                    -2
                } else {
                    0
                }
            })
        })
        .collect()
}

fn read_mask(file: &File) -> Result<(Vec<i32>, usize, usize), PluginError> {
    let ds = file.dataset(PIXEL_MASK).map_err(|e| {
        PluginError::new(ERR_READ, format!("PLUGIN ERROR: CANNOT READ PIXEL MASK: {e}"))
    })?;
    if ds.data_type_id() != 0 || ds.dim().len() != 2 {
        return Err(PluginError::new(
            ERR_READ,
            "PLUGIN ERROR: PIXEL MASK HAS UNEXPECTED SHAPE OR TYPE",
        ));
    }
    let dimy = ds.dim()[0] as usize;
    let dimx = ds.dim()[1] as usize;
    let size = ds.data_size() as usize;
    let signed = ds.is_signed();
    let mut raw = vec![0u8; ds.byte_size()];
    ds.read(&mut raw).map_err(PluginError::from)?;

    let range_err =
        || PluginError::new(ERR_READ, "PLUGIN ERROR: PIXEL MASK VALUE OUT OF RANGE");
    let mask = preprocess_mask(raw.chunks_exact(size).map(|c| {
        let wide: i128 = if signed {
            match size {
                1 => c[0] as i8 as i128,
                2 => i16::from_le_bytes(c.try_into().unwrap()) as i128,
                4 => i32::from_le_bytes(c.try_into().unwrap()) as i128,
                8 => i64::from_le_bytes(c.try_into().unwrap()) as i128,
                _ => return Err(range_err()),
            }
        } else {
            match size {
                1 => c[0] as i128,
                2 => u16::from_le_bytes(c.try_into().unwrap()) as i128,
                4 => u32::from_le_bytes(c.try_into().unwrap()) as i128,
                8 => u64::from_le_bytes(c.try_into().unwrap()) as i128,
                _ => return Err(range_err()),
            }
        };
        u32::try_from(wide).map_err(|_| range_err())
    }))?;
    Ok((mask, dimy, dimx))
}

// ---------------------------------------------------------------------------
// frame stacks
// ---------------------------------------------------------------------------

fn dataset_path(global_frame: usize, cache: &DataCache) -> Result<String, PluginError> {
    let dataset_number = global_frame / cache.frames_per_dataset + 1;
    if cache.master_only {
        if dataset_number > 1 {
            return Err(PluginError::new(
                ERR_USAGE,
                "PLUGIN ERROR: frame beyond the single data block of this master file",
            ));
        }
        return Ok("/entry/data/data".to_owned());
    }
    Ok(format!("/entry/data/data_{dataset_number:06}"))
}

/// Open the frame stack and validate it against the mask geometry.
fn open_frame_stack(
    file: &File,
    path: &str,
    dimy: usize,
    dimx: usize,
) -> Result<Dataset, PluginError> {
    let ds = file.dataset(path).map_err(PluginError::from)?;
    let dims = ds.dim().to_vec();
    if ds.data_type_id() != 0
        || dims.len() != 3
        || dims[1] as usize != dimy
        || dims[2] as usize != dimx
        || !ds.is_chunked()
        || ds.chunk_shape() != vec![1, dimy as u64, dimx as u64]
    {
        return Err(PluginError::new(
            ERR_READ,
            format!("PLUGIN ERROR: {path} DOES NOT MATCH THE DETECTOR GEOMETRY"),
        ));
    }
    Ok(ds)
}

fn apply_mask_and_clamp(
    raw: &[u8],
    datasize: usize,
    mask: &[i32],
    out: &mut [i32],
) -> Result<(), PluginError> {
    match datasize {
        1 => {
            for ((dst, &m), &v) in out.iter_mut().zip(mask).zip(raw) {
                *dst = if m != 0 {
                    m
                } else if v == 0xFF {
                    -1
                } else {
                    v as i32
                };
            }
        }
        2 => {
            for ((dst, &m), c) in out.iter_mut().zip(mask).zip(raw.chunks_exact(2)) {
                let v = u16::from_le_bytes(c.try_into().unwrap());
                *dst = if m != 0 {
                    m
                } else if v == 0xFFFF {
                    -1
                } else {
                    v as i32
                };
            }
        }
        4 => {
            for ((dst, &m), c) in out.iter_mut().zip(mask).zip(raw.chunks_exact(4)) {
                let v = u32::from_le_bytes(c.try_into().unwrap());
                *dst = if m != 0 {
                    m
                } else if v > i32::MAX as u32 {
                    -1
                } else {
                    v as i32
                };
            }
        }
        other => {
            return Err(PluginError::new(
                ERR_DATASIZE,
                format!("PLUGIN ERROR: DATASIZE {other} NOT SUPPORTED"),
            ))
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// entry points
// ---------------------------------------------------------------------------

/// # Safety
/// `filename` must be a valid NUL-terminated C string; `info_array` must
/// point to at least 1024 ints; `error_flag` to one int.
#[no_mangle]
pub unsafe extern "C" fn plugin_open(
    filename: *const c_char,
    info_array: *mut c_int,
    error_flag: *mut c_int,
) {
    fill_info(info_array);
    let result = (|| -> Result<(), PluginError> {
        if filename.is_null() {
            return Err(PluginError::new(ERR_READ, "PLUGIN ERROR: NULL FILENAME"));
        }
        let name = CStr::from_ptr(filename).to_string_lossy().into_owned();
        let file = File::open(&name).map_err(|e| {
            PluginError::new(ERR_READ, format!("PLUGIN ERROR: CANNOT OPEN {name}: {e}"))
        })?;
        let mut handle = HANDLE.lock().unwrap();
        if handle.is_some() {
            return Err(PluginError::new(
                ERR_READ,
                "PLUGIN ERROR: CAN ONLY OPEN ONE FILE AT A TIME",
            ));
        }
        *handle = Some(DataCache {
            file,
            filename: name,
            dimx: 0,
            dimy: 0,
            datasize: 0,
            frames_per_dataset: 0,
            number_of_frames: 0,
            master_only: false,
            mask: Vec::new(),
            x_pixel_size: 0.0,
            y_pixel_size: 0.0,
        });
        Ok(())
    })();
    report(result, error_flag);
}

/// # Safety
/// All pointers must reference valid caller-owned storage per the plugin
/// contract (`info` at least 1024 ints).
#[no_mangle]
pub unsafe extern "C" fn plugin_get_header(
    nx: *mut c_int,
    ny: *mut c_int,
    nbytes: *mut c_int,
    qx: *mut c_float,
    qy: *mut c_float,
    number_of_frames: *mut c_int,
    info: *mut c_int,
    error_flag: *mut c_int,
) {
    fill_info(info);
    let result = (|| -> Result<(), PluginError> {
        let mut handle = HANDLE.lock().unwrap();
        let cache = handle.as_mut().ok_or_else(|| {
            PluginError::new(ERR_USAGE, "PLUGIN ERROR: NO FILE HAS BEEN OPENED YET")
        })?;

        cache.x_pixel_size = read_pixel_size(&cache.file, PIXEL_SIZE_X)?;
        cache.y_pixel_size = read_pixel_size(&cache.file, PIXEL_SIZE_Y)?;

        let (mask, dimy, dimx) = read_mask(&cache.file)?;
        cache.mask = mask;
        cache.dimy = dimy;
        cache.dimx = dimx;

        let nimages = match cache.file.dataset(NIMAGES) {
            Ok(ds) => read_positive_uint(&ds)?,
            Err(e) => {
                return Err(PluginError::new(
                    ERR_READ,
                    format!(
                        "PLUGIN ERROR: CANNOT READ NIMAGES FROM {}: {e}",
                        cache.filename
                    ),
                ))
            }
        };
        let ntrigger = match cache.file.dataset(NTRIGGER) {
            Ok(ds) => read_positive_uint(&ds)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                eprintln!("PLUGIN WARNING: {NTRIGGER} not found, using ntrigger = 1");
                1
            }
            Err(e) => return Err(PluginError::from(e)),
        };

        // Frame stacks live in numbered external datasets; masters written
        // without data files keep everything in /entry/data/data.
        let stack = match open_frame_stack(&cache.file, "/entry/data/data_000001", dimy, dimx)
        {
            Ok(ds) => {
                cache.master_only = false;
                ds
            }
            Err(_) => {
                cache.master_only = true;
                open_frame_stack(&cache.file, "/entry/data/data", dimy, dimx)?
            }
        };
        cache.frames_per_dataset = stack.dim()[0] as usize;
        cache.datasize = stack.data_size() as usize;
        cache.number_of_frames = (nimages * ntrigger) as usize;

        // SAFETY: caller-owned output slots.
        if !nx.is_null() {
            *nx = cache.dimx as c_int;
        }
        if !ny.is_null() {
            *ny = cache.dimy as c_int;
        }
        if !nbytes.is_null() {
            *nbytes = cache.datasize as c_int;
        }
        if !qx.is_null() {
            *qx = cache.x_pixel_size;
        }
        if !qy.is_null() {
            *qy = cache.y_pixel_size;
        }
        if !number_of_frames.is_null() {
            *number_of_frames = cache.number_of_frames as c_int;
        }
        Ok(())
    })();
    report(result, error_flag);
}

/// # Safety
/// `frame_number` must point to one int; `data_array` to `nx * ny` ints as
/// returned by `plugin_get_header`; `info_array` to 1024 ints.
#[no_mangle]
pub unsafe extern "C" fn plugin_get_data(
    frame_number: *mut c_int,
    _nx: *mut c_int,
    _ny: *mut c_int,
    data_array: *mut c_int,
    info_array: *mut c_int,
    error_flag: *mut c_int,
) {
    fill_info(info_array);
    let result = (|| -> Result<(), PluginError> {
        let handle = HANDLE.lock().unwrap();
        let cache = handle.as_ref().ok_or_else(|| {
            PluginError::new(ERR_USAGE, "PLUGIN ERROR: NO FILE HAS BEEN OPENED YET")
        })?;
        if cache.frames_per_dataset == 0 {
            return Err(PluginError::new(
                ERR_USAGE,
                "PLUGIN ERROR: HEADER HAS NOT BEEN READ YET",
            ));
        }
        if frame_number.is_null() || data_array.is_null() {
            return Err(PluginError::new(ERR_USAGE, "PLUGIN ERROR: NULL ARGUMENT"));
        }
        let requested = *frame_number;
        if requested < 1 {
            return Err(PluginError::new(
                ERR_USAGE,
                "PLUGIN ERROR: FRAME NUMBERS START FROM 1",
            ));
        }
        let global = (requested - 1) as usize;
        if global >= cache.number_of_frames {
            return Err(PluginError::new(
                ERR_USAGE,
                format!("PLUGIN ERROR: CANNOT OPEN FRAME {requested}"),
            ));
        }

        let path = dataset_path(global, cache)?;
        let stack = open_frame_stack(&cache.file, &path, cache.dimy, cache.dimx)?;
        let frame_in_dataset = global % cache.frames_per_dataset;
        if frame_in_dataset as u64 >= stack.dim()[0] {
            return Err(PluginError::new(
                ERR_USAGE,
                format!("PLUGIN ERROR: CANNOT OPEN FRAME {requested}"),
            ));
        }

        let mut raw = vec![0u8; stack.chunk_byte_size()];
        stack
            .read_chunk(&mut raw, &[frame_in_dataset as u64, 0, 0])
            .map_err(|e| {
                // a missing chunk is the caller asking past the series
                let code = match e.kind() {
                    ErrorKind::NotFound | ErrorKind::Argument => ERR_USAGE,
                    _ => ERR_READ,
                };
                PluginError::new(code, format!("PLUGIN ERROR: CANNOT OPEN FRAME {requested}: {e}"))
            })?;

        let pixels = cache.dimx * cache.dimy;
        // SAFETY: data_array holds nx*ny ints per the contract.
        let out = std::slice::from_raw_parts_mut(data_array, pixels);
        apply_mask_and_clamp(&raw, cache.datasize, &cache.mask, out)
    })();
    report(result, error_flag);
}

/// # Safety
/// `error_flag` must be null or point to one int.
#[no_mangle]
pub unsafe extern "C" fn plugin_close(error_flag: *mut c_int) {
    *HANDLE.lock().unwrap() = None;
    if !error_flag.is_null() {
        *error_flag = 0;
    }
}
