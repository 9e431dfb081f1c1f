//! Peak blob encoding as stored in `RefSpectraPeaks`.
//!
//! m/z values are `f64` and intensities `f32`, each array stored in its own
//! blob. A blob is zlib compressed only when that makes it smaller, so a blob
//! whose length equals the uncompressed size is read as-is.
use std::borrow::Cow;
use std::io::{
    Read,
    Write,
};

use bytemuck::Pod;
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use crate::errors::PeakDecodeError;
use crate::models::Peak;

/// Interpret (and if needed decompress) a single blob as `n` values of `T`.
///
/// Borrows from the blob when it is uncompressed and suitably aligned.
/// Inflation stops one byte past the expected size, so the declared count
/// never drives an allocation.
fn decode_array<'a, T: Pod>(
    blob: &'a [u8],
    n: usize,
    array: &'static str,
) -> Result<Cow<'a, [T]>, PeakDecodeError> {
    let expected = n
        .checked_mul(std::mem::size_of::<T>())
        .ok_or(PeakDecodeError::TooManyPeaks { array, num_peaks: n })?;
    if blob.len() == expected {
        return Ok(match bytemuck::try_cast_slice(blob) {
            Ok(values) => Cow::Borrowed(values),
            Err(_) => Cow::Owned(bytemuck::pod_collect_to_vec(blob)),
        });
    }

    let mut bytes = Vec::new();
    ZlibDecoder::new(blob)
        .take((expected as u64).saturating_add(1))
        .read_to_end(&mut bytes)
        .map_err(|e| PeakDecodeError::Decompression { array, source: e })?;
    if bytes.len() != expected {
        return Err(PeakDecodeError::LengthMismatch {
            array,
            expected,
            real: bytes.len(),
        });
    }
    Ok(Cow::Owned(bytemuck::pod_collect_to_vec(&bytes)))
}

/// Decode the peak blobs of one spectrum.
///
/// Peaks are zipped positionally, no sorting is done. A single invalid peak
/// (see [`Peak::is_valid`]) rejects the whole spectrum.
///
/// # Example
///
/// ```
/// use blibfilter::codec::{decode_peaks, encode_peaks};
/// use blibfilter::models::Peak;
///
/// let peaks = vec![Peak::new(100.0, 1.0), Peak::new(200.5, 20.0)];
/// let (mz_blob, intensity_blob) = encode_peaks(&peaks).unwrap();
/// let decoded = decode_peaks(peaks.len(), &mz_blob, &intensity_blob).unwrap();
/// assert_eq!(decoded, peaks);
/// ```
pub fn decode_peaks(
    num_peaks: usize,
    mz_blob: &[u8],
    intensity_blob: &[u8],
) -> Result<Vec<Peak>, PeakDecodeError> {
    let mzs = decode_array::<f64>(mz_blob, num_peaks, "m/z")?;
    let intensities = decode_array::<f32>(intensity_blob, num_peaks, "intensity")?;

    mzs.iter()
        .zip(intensities.iter())
        .enumerate()
        .map(|(index, (&mz, &intensity))| {
            let peak = Peak { mz, intensity };
            if peak.is_valid() {
                Ok(peak)
            } else {
                Err(PeakDecodeError::InvalidPeak {
                    index,
                    mz,
                    intensity,
                })
            }
        })
        .collect()
}

fn encode_array<T: Pod>(values: &[T]) -> std::io::Result<Vec<u8>> {
    let raw: &[u8] = bytemuck::cast_slice(values);
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(raw.len()), Compression::default());
    encoder.write_all(raw)?;
    let compressed = encoder.finish()?;
    if compressed.len() < raw.len() {
        Ok(compressed)
    } else {
        Ok(raw.to_vec())
    }
}

/// Encode peaks into `(mz_blob, intensity_blob)`.
pub fn encode_peaks(peaks: &[Peak]) -> std::io::Result<(Vec<u8>, Vec<u8>)> {
    let mzs: Vec<f64> = peaks.iter().map(|p| p.mz).collect();
    let intensities: Vec<f32> = peaks.iter().map(|p| p.intensity).collect();
    Ok((encode_array(&mzs)?, encode_array(&intensities)?))
}
