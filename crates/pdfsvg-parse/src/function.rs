//! Reading PDF function objects into [`PdfFunction`].

use lopdf::{Dictionary, Object};
use pdfsvg_core::function::{SampledFunction, parse_postscript};
use pdfsvg_core::{FunctionError, PdfFunction};

use crate::lopdf_backend::{as_dict_like, dict_get, numbers, object_to_f64, resolve, stream_data};

const MAX_FUNCTION_DEPTH: usize = 8;

/// Parse a function dictionary, stream, or array of one-output functions.
pub fn parse_function(doc: &lopdf::Document, obj: &Object) -> Result<PdfFunction, FunctionError> {
    parse_at(doc, obj, 0)
}

fn parse_at(
    doc: &lopdf::Document,
    obj: &Object,
    depth: usize,
) -> Result<PdfFunction, FunctionError> {
    if depth > MAX_FUNCTION_DEPTH {
        return Err(FunctionError("function nesting too deep".to_string()));
    }
    let obj = resolve(doc, obj);
    if let Object::Array(items) = obj {
        let functions = items
            .iter()
            .map(|f| parse_at(doc, f, depth + 1))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(PdfFunction::Array(functions));
    }
    let dict = as_dict_like(obj)
        .ok_or_else(|| FunctionError("function is not a dictionary".to_string()))?;
    let kind = dict_get(doc, dict, b"FunctionType")
        .and_then(object_to_f64)
        .ok_or_else(|| FunctionError("missing /FunctionType".to_string()))?;
    let array = |key: &[u8]| dict_get(doc, dict, key).and_then(|o| numbers(doc, o));
    let domain = array(b"Domain").unwrap_or_else(|| vec![0.0, 1.0]);
    match kind as i64 {
        0 => {
            let Object::Stream(stream) = obj else {
                return Err(FunctionError("type 0 function must be a stream".to_string()));
            };
            let range = array(b"Range")
                .ok_or_else(|| FunctionError("type 0 function needs /Range".to_string()))?;
            let size: Vec<u32> = array(b"Size")
                .ok_or_else(|| FunctionError("type 0 function needs /Size".to_string()))?
                .into_iter()
                .map(|s| s.max(1.0) as u32)
                .collect();
            let bits_per_sample = dict_get(doc, dict, b"BitsPerSample")
                .and_then(object_to_f64)
                .map_or(8, |b| b as u32);
            if !matches!(bits_per_sample, 1 | 2 | 4 | 8 | 12 | 16 | 24 | 32) {
                return Err(FunctionError(format!("unsupported BitsPerSample {bits_per_sample}")));
            }
            let encode = array(b"Encode")
                .unwrap_or_else(|| size.iter().flat_map(|s| [0.0, f64::from(*s) - 1.0]).collect());
            let decode = array(b"Decode").unwrap_or_else(|| range.clone());
            let samples = stream_data(stream).map_err(|e| FunctionError(e.to_string()))?;
            Ok(PdfFunction::Sampled(SampledFunction {
                domain,
                range,
                size,
                bits_per_sample,
                encode,
                decode,
                samples,
            }))
        }
        2 => Ok(PdfFunction::Exponential {
            domain: first_interval(&domain),
            c0: array(b"C0").unwrap_or_else(|| vec![0.0]),
            c1: array(b"C1").unwrap_or_else(|| vec![1.0]),
            n: dict_get(doc, dict, b"N").and_then(object_to_f64).unwrap_or(1.0),
        }),
        3 => stitching(doc, dict, &domain, depth),
        4 => {
            let Object::Stream(stream) = obj else {
                return Err(FunctionError("type 4 function must be a stream".to_string()));
            };
            let range = array(b"Range")
                .ok_or_else(|| FunctionError("type 4 function needs /Range".to_string()))?;
            let source = stream_data(stream).map_err(|e| FunctionError(e.to_string()))?;
            Ok(PdfFunction::PostScript {
                domain,
                range,
                program: parse_postscript(&source)?,
            })
        }
        other => Err(FunctionError(format!("unsupported function type {other}"))),
    }
}

fn stitching(
    doc: &lopdf::Document,
    dict: &Dictionary,
    domain: &[f64],
    depth: usize,
) -> Result<PdfFunction, FunctionError> {
    let functions = match dict_get(doc, dict, b"Functions") {
        Some(Object::Array(items)) => items
            .iter()
            .map(|f| parse_at(doc, f, depth + 1))
            .collect::<Result<Vec<_>, _>>()?,
        _ => return Err(FunctionError("type 3 function needs /Functions".to_string())),
    };
    if functions.is_empty() {
        return Err(FunctionError("type 3 function has no sub-functions".to_string()));
    }
    let bounds = dict_get(doc, dict, b"Bounds")
        .and_then(|o| numbers(doc, o))
        .unwrap_or_default();
    if bounds.len() + 1 != functions.len() {
        return Err(FunctionError(format!(
            "type 3 function has {} functions but {} bounds",
            functions.len(),
            bounds.len()
        )));
    }
    let encode = dict_get(doc, dict, b"Encode")
        .and_then(|o| numbers(doc, o))
        .unwrap_or_else(|| functions.iter().flat_map(|_| [0.0, 1.0]).collect());
    Ok(PdfFunction::Stitching {
        domain: first_interval(domain),
        functions,
        bounds,
        encode,
    })
}

fn first_interval(domain: &[f64]) -> [f64; 2] {
    [
        domain.first().copied().unwrap_or(0.0),
        domain.get(1).copied().unwrap_or(1.0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Stream, dictionary};

    fn exponential(c0: f64, c1: f64) -> Object {
        dictionary! {
            "FunctionType" => 2,
            "Domain" => vec![0.into(), 1.into()],
            "C0" => vec![c0.into()],
            "C1" => vec![c1.into()],
            "N" => 1,
        }
        .into()
    }

    #[test]
    fn exponential_defaults() {
        let doc = lopdf::Document::new();
        let dict = dictionary! { "FunctionType" => 2, "N" => 2 };
        let f = parse_function(&doc, &dict.into()).unwrap();
        assert_eq!(f.eval(&[0.5]), vec![0.25]);
    }

    #[test]
    fn stitching_selects_sub_function() {
        let doc = lopdf::Document::new();
        let f: Object = dictionary! {
            "FunctionType" => 3,
            "Domain" => vec![0.into(), 1.into()],
            "Functions" => vec![exponential(0.0, 1.0), exponential(1.0, 0.0)],
            "Bounds" => vec![0.5.into()],
            "Encode" => vec![0.into(), 1.into(), 0.into(), 1.into()],
        }
        .into();
        let f = parse_function(&doc, &f).unwrap();
        assert_eq!(f.eval(&[0.25]), vec![0.5]);
        assert_eq!(f.eval(&[0.75]), vec![0.5]);
        assert_eq!(f.eval(&[1.0]), vec![0.0]);
    }

    #[test]
    fn stitching_bounds_must_match() {
        let doc = lopdf::Document::new();
        let f: Object = dictionary! {
            "FunctionType" => 3,
            "Functions" => vec![exponential(0.0, 1.0)],
            "Bounds" => vec![0.5.into()],
        }
        .into();
        assert!(parse_function(&doc, &f).is_err());
    }

    #[test]
    fn sampled_function_from_stream() {
        let mut doc = lopdf::Document::new();
        let id = doc.add_object(Stream::new(
            dictionary! {
                "FunctionType" => 0,
                "Domain" => vec![0.into(), 1.into()],
                "Range" => vec![0.into(), 1.into()],
                "Size" => vec![2.into()],
                "BitsPerSample" => 8,
            },
            vec![0, 255],
        ));
        let f = parse_function(&doc, &Object::Reference(id)).unwrap();
        let out = f.eval(&[0.5]);
        assert!((out[0] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn postscript_function_from_stream() {
        let mut doc = lopdf::Document::new();
        let id = doc.add_object(Stream::new(
            dictionary! {
                "FunctionType" => 4,
                "Domain" => vec![0.into(), 1.into()],
                "Range" => vec![0.into(), 1.into()],
            },
            b"{ 1 exch sub }".to_vec(),
        ));
        let f = parse_function(&doc, &Object::Reference(id)).unwrap();
        assert_eq!(f.eval(&[0.25]), vec![0.75]);
    }

    #[test]
    fn function_arrays_concatenate_outputs() {
        let doc = lopdf::Document::new();
        let f = Object::Array(vec![exponential(0.0, 1.0), exponential(1.0, 0.0)]);
        let f = parse_function(&doc, &f).unwrap();
        assert_eq!(f.eval(&[1.0]), vec![1.0, 0.0]);
    }

    #[test]
    fn unknown_type_is_an_error() {
        let doc = lopdf::Document::new();
        let err = parse_function(&doc, &dictionary! { "FunctionType" => 7 }.into()).unwrap_err();
        assert!(err.0.contains("unsupported function type 7"));
    }
}
