//! PNG and TIFF predictors applied after Flate or LZW decoding.

use crate::error::{PdfError, Result};
use crate::model::objects::PdfDict;

/// `/DecodeParms` entries that drive a predictor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictorParams {
    pub predictor: i64,
    pub colors: usize,
    pub bits_per_component: usize,
    pub columns: usize,
}

impl Default for PredictorParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            colors: 1,
            bits_per_component: 8,
            columns: 1,
        }
    }
}

impl PredictorParams {
    pub fn from_dict(parms: &PdfDict) -> Self {
        let d = Self::default();
        let positive = |key: &str, default: usize| {
            parms
                .get_i64(key)
                .filter(|&v| v > 0)
                .map_or(default, |v| v as usize)
        };
        Self {
            predictor: parms.get_i64("Predictor").unwrap_or(d.predictor),
            colors: positive("Colors", d.colors),
            bits_per_component: positive("BitsPerComponent", d.bits_per_component),
            columns: positive("Columns", d.columns),
        }
    }

    fn bytes_per_pixel(&self) -> usize {
        ((self.colors * self.bits_per_component).div_ceil(8)).max(1)
    }

    fn row_len(&self) -> Result<usize> {
        self.colors
            .checked_mul(self.bits_per_component)
            .and_then(|bits| bits.checked_mul(self.columns))
            .map(|bits| bits.div_ceil(8))
            .ok_or_else(|| predictor_error(format!("row of {} columns overflows", self.columns)))
    }

    fn validate(&self) -> Result<()> {
        if !matches!(self.bits_per_component, 1 | 2 | 4 | 8 | 16) {
            return Err(predictor_error(format!(
                "unsupported BitsPerComponent {}",
                self.bits_per_component
            )));
        }
        if self.colors > 32 {
            return Err(predictor_error(format!("too many colors: {}", self.colors)));
        }
        self.row_len().map(|_| ())
    }
}

fn predictor_error(msg: String) -> PdfError {
    PdfError::Decode {
        filter: "Predictor",
        msg,
    }
}

/// Undo the predictor described by `params`. Predictor values below 10
/// other than 2 leave the data untouched.
pub fn decode_predictor(data: &[u8], params: &PredictorParams) -> Result<Vec<u8>> {
    match params.predictor {
        2 => {
            params.validate()?;
            tiff_decode(data, params)
        }
        p if p >= 10 => {
            params.validate()?;
            png_decode(data, params)
        }
        _ => Ok(data.to_vec()),
    }
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// PNG rows carry a leading filter-type byte. A trailing partial row is
/// dropped.
fn png_decode(data: &[u8], params: &PredictorParams) -> Result<Vec<u8>> {
    let row_len = params.row_len()?;
    if !data.is_empty() && row_len >= data.len() {
        return Err(predictor_error(format!(
            "row of {row_len} bytes exceeds {} bytes of data",
            data.len()
        )));
    }
    let bpp = params.bytes_per_pixel();
    let mut out = Vec::with_capacity(data.len());
    let mut prev = vec![0u8; row_len];
    let mut curr = vec![0u8; row_len];

    for chunk in data.chunks_exact(row_len + 1) {
        let (tag, row) = (chunk[0], &chunk[1..]);
        curr.copy_from_slice(row);
        match tag {
            0 => {}
            1 => {
                for i in bpp..row_len {
                    curr[i] = curr[i].wrapping_add(curr[i - bpp]);
                }
            }
            2 => {
                for i in 0..row_len {
                    curr[i] = curr[i].wrapping_add(prev[i]);
                }
            }
            3 => {
                for i in 0..row_len {
                    let left = if i >= bpp { curr[i - bpp] } else { 0 };
                    let avg = ((left as u16 + prev[i] as u16) / 2) as u8;
                    curr[i] = curr[i].wrapping_add(avg);
                }
            }
            4 => {
                for i in 0..row_len {
                    let (left, upper_left) = if i >= bpp {
                        (curr[i - bpp], prev[i - bpp])
                    } else {
                        (0, 0)
                    };
                    curr[i] = curr[i].wrapping_add(paeth(left, prev[i], upper_left));
                }
            }
            other => {
                return Err(predictor_error(format!("unknown PNG filter type {other}")));
            }
        }
        out.extend_from_slice(&curr);
        std::mem::swap(&mut prev, &mut curr);
    }
    Ok(out)
}

fn read_sample(row: &[u8], idx: usize, bits: usize) -> u32 {
    match bits {
        8 => row[idx] as u32,
        16 => u16::from_be_bytes([row[idx * 2], row[idx * 2 + 1]]) as u32,
        _ => {
            let bit = idx * bits;
            let shift = 8 - bits - bit % 8;
            ((row[bit / 8] >> shift) as u32) & ((1 << bits) - 1)
        }
    }
}

fn write_sample(row: &mut [u8], idx: usize, bits: usize, value: u32) {
    match bits {
        8 => row[idx] = value as u8,
        16 => row[idx * 2..idx * 2 + 2].copy_from_slice(&(value as u16).to_be_bytes()),
        _ => {
            let bit = idx * bits;
            let shift = 8 - bits - bit % 8;
            let mask = (((1u32 << bits) - 1) as u8) << shift;
            let byte = &mut row[bit / 8];
            *byte = (*byte & !mask) | (((value as u8) << shift) & mask);
        }
    }
}

/// TIFF predictor 2: each sample is a difference from the same component
/// of the pixel to its left, modulo the sample size.
fn tiff_decode(data: &[u8], params: &PredictorParams) -> Result<Vec<u8>> {
    let mut out = data.to_vec();
    let row_len = params.row_len()?;
    let bits = params.bits_per_component;
    let modulus_mask = if bits == 16 { 0xFFFF } else { (1u32 << bits) - 1 };
    let samples = params.columns * params.colors;
    for row in out.chunks_exact_mut(row_len) {
        for idx in params.colors..samples {
            let left = read_sample(row, idx - params.colors, bits);
            let v = read_sample(row, idx, bits);
            write_sample(row, idx, bits, (v + left) & modulus_mask);
        }
    }
    Ok(out)
}

/// Apply PNG filter `filter_type` (0-4) to every row.
pub fn encode_png(data: &[u8], params: &PredictorParams, filter_type: u8) -> Result<Vec<u8>> {
    if filter_type > 4 {
        return Err(predictor_error(format!("unknown PNG filter type {filter_type}")));
    }
    params.validate()?;
    let row_len = params.row_len()?;
    let bpp = params.bytes_per_pixel();
    let zero = vec![0u8; row_len];
    let mut out = Vec::with_capacity(data.len() + data.len() / row_len.max(1) + 1);
    let mut prev: &[u8] = &zero;
    for row in data.chunks_exact(row_len) {
        out.push(filter_type);
        for i in 0..row_len {
            let left = if i >= bpp { row[i - bpp] } else { 0 };
            let upper_left = if i >= bpp { prev[i - bpp] } else { 0 };
            let predicted = match filter_type {
                0 => 0,
                1 => left,
                2 => prev[i],
                3 => ((left as u16 + prev[i] as u16) / 2) as u8,
                _ => paeth(left, prev[i], upper_left),
            };
            out.push(row[i].wrapping_sub(predicted));
        }
        prev = row;
    }
    Ok(out)
}

/// Inverse of the TIFF predictor 2 decoder.
pub fn encode_tiff(data: &[u8], params: &PredictorParams) -> Result<Vec<u8>> {
    params.validate()?;
    let mut out = data.to_vec();
    let row_len = params.row_len()?;
    let bits = params.bits_per_component;
    let modulus_mask = if bits == 16 { 0xFFFF } else { (1u32 << bits) - 1 };
    let samples = params.columns * params.colors;
    for row in out.chunks_exact_mut(row_len) {
        // right to left so every difference uses the original neighbour
        for idx in (params.colors..samples).rev() {
            let left = read_sample(row, idx - params.colors, bits);
            let v = read_sample(row, idx, bits);
            write_sample(row, idx, bits, v.wrapping_sub(left) & modulus_mask);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(predictor: i64, colors: usize, bpc: usize, columns: usize) -> PredictorParams {
        PredictorParams {
            predictor,
            colors,
            bits_per_component: bpc,
            columns,
        }
    }

    #[test]
    fn png_up_rows() {
        let p = params(12, 1, 8, 3);
        let data = [2, 1, 2, 3, 2, 1, 1, 1];
        assert_eq!(png_decode(&data, &p).unwrap(), vec![1, 2, 3, 2, 3, 4]);
    }

    #[test]
    fn png_every_filter_type_inverts() {
        let p = params(15, 3, 8, 4);
        let data: Vec<u8> = (0..36u32).map(|i| (i * 37 % 256) as u8).collect();
        for filter in 0..=4 {
            let encoded = encode_png(&data, &p, filter).unwrap();
            assert_eq!(decode_predictor(&encoded, &p).unwrap(), data, "filter {filter}");
        }
    }

    #[test]
    fn png_partial_row_dropped() {
        let p = params(10, 1, 8, 2);
        assert_eq!(png_decode(&[0, 5, 6, 0, 7], &p).unwrap(), vec![5, 6]);
    }

    #[test]
    fn png_unknown_filter_fails() {
        let p = params(10, 1, 8, 1);
        assert!(png_decode(&[9, 1], &p).is_err());
    }

    #[test]
    fn tiff_eight_and_sixteen_bit() {
        let p = params(2, 1, 8, 4);
        assert_eq!(decode_predictor(&[10, 1, 1, 255], &p).unwrap(), vec![10, 11, 12, 11]);

        let p16 = params(2, 1, 16, 2);
        let decoded = decode_predictor(&[0x01, 0x00, 0x00, 0x02], &p16).unwrap();
        assert_eq!(decoded, vec![0x01, 0x00, 0x01, 0x02]);
    }

    #[test]
    fn tiff_small_samples_invert() {
        for bpc in [1, 2, 4] {
            let p = params(2, 2, bpc, 8);
            let data: Vec<u8> = (0..p.row_len().unwrap() * 3)
                .map(|i| (i * 91 + 7) as u8)
                .collect();
            let encoded = encode_tiff(&data, &p).unwrap();
            assert_eq!(decode_predictor(&encoded, &p).unwrap(), data, "bpc {bpc}");
        }
    }

    #[test]
    fn oversized_rows_are_rejected() {
        for predictor in [2, 12] {
            let p = params(predictor, 1, 8, 1 << 62);
            assert!(matches!(
                decode_predictor(&[0, 1, 2, 3], &p),
                Err(PdfError::Decode { filter: "Predictor", .. })
            ));
        }

        let wide = params(12, 3, 8, 1000);
        assert!(matches!(
            decode_predictor(&[0; 64], &wide),
            Err(PdfError::Decode { filter: "Predictor", .. })
        ));
        assert!(decode_predictor(&[], &wide).unwrap().is_empty());
    }

    #[test]
    fn predictor_one_is_identity() {
        assert_eq!(decode_predictor(b"abc", &PredictorParams::default()).unwrap(), b"abc");
    }
}
