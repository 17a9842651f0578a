//! PDF functions (types 0, 2, 3, and 4).
//!
//! Functions map `m` inputs to `n` outputs. They drive shading colors and
//! Separation/DeviceN tint transforms.

use std::fmt;

/// Why a function could not be built.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionError(pub String);

impl fmt::Display for FunctionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "function error: {}", self.0)
    }
}

impl std::error::Error for FunctionError {}

/// A parsed PDF function.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfFunction {
    /// Type 0: sampled table with multilinear interpolation.
    Sampled(SampledFunction),
    /// Type 2: `y = C0 + x^N × (C1 − C0)`.
    Exponential {
        domain: [f64; 2],
        c0: Vec<f64>,
        c1: Vec<f64>,
        n: f64,
    },
    /// Type 3: one-input stitching of sub-functions.
    Stitching {
        domain: [f64; 2],
        functions: Vec<PdfFunction>,
        bounds: Vec<f64>,
        encode: Vec<f64>,
    },
    /// Type 4: PostScript calculator program.
    PostScript {
        domain: Vec<f64>,
        range: Vec<f64>,
        program: Vec<PsOp>,
    },
    /// An array of one-output functions evaluated side by side.
    Array(Vec<PdfFunction>),
}

/// Sample table of a type 0 function.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledFunction {
    pub domain: Vec<f64>,
    pub range: Vec<f64>,
    pub size: Vec<u32>,
    pub bits_per_sample: u32,
    pub encode: Vec<f64>,
    pub decode: Vec<f64>,
    pub samples: Vec<u8>,
}

fn interpolate(x: f64, x0: f64, x1: f64, y0: f64, y1: f64) -> f64 {
    if (x1 - x0).abs() < f64::EPSILON {
        y0
    } else {
        y0 + (x - x0) * (y1 - y0) / (x1 - x0)
    }
}

/// Clamp without panicking on reversed or NaN bounds.
pub(crate) fn clamp_between(x: f64, a: f64, b: f64) -> f64 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    if x.is_nan() { lo } else { x.max(lo).min(hi) }
}

impl PdfFunction {
    /// Number of inputs the function expects.
    pub fn input_count(&self) -> usize {
        match self {
            PdfFunction::Sampled(s) => s.domain.len() / 2,
            PdfFunction::Exponential { .. } | PdfFunction::Stitching { .. } => 1,
            PdfFunction::PostScript { domain, .. } => domain.len() / 2,
            PdfFunction::Array(fs) => fs.first().map_or(1, PdfFunction::input_count),
        }
    }

    /// Domain of the first input.
    pub fn domain(&self) -> [f64; 2] {
        match self {
            PdfFunction::Sampled(s) => [
                s.domain.first().copied().unwrap_or(0.0),
                s.domain.get(1).copied().unwrap_or(1.0),
            ],
            PdfFunction::Exponential { domain, .. } | PdfFunction::Stitching { domain, .. } => {
                *domain
            }
            PdfFunction::PostScript { domain, .. } => [
                domain.first().copied().unwrap_or(0.0),
                domain.get(1).copied().unwrap_or(1.0),
            ],
            PdfFunction::Array(fs) => fs.first().map_or([0.0, 1.0], PdfFunction::domain),
        }
    }

    /// Evaluate the function. Inputs are clipped to the domain.
    pub fn eval(&self, input: &[f64]) -> Vec<f64> {
        match self {
            PdfFunction::Sampled(s) => s.eval(input),
            PdfFunction::Exponential { domain, c0, c1, n } => {
                let x = clamp_between(input.first().copied().unwrap_or(0.0), domain[0], domain[1]);
                let xn = if *n == 1.0 { x } else { x.powf(*n) };
                let len = c0.len().max(c1.len());
                (0..len)
                    .map(|i| {
                        let a = c0.get(i).copied().unwrap_or(0.0);
                        let b = c1.get(i).copied().unwrap_or(1.0);
                        a + xn * (b - a)
                    })
                    .collect()
            }
            PdfFunction::Stitching {
                domain,
                functions,
                bounds,
                encode,
            } => {
                let x = clamp_between(input.first().copied().unwrap_or(0.0), domain[0], domain[1]);
                let last = functions.len().saturating_sub(1);
                let k = bounds.iter().take_while(|b| x >= **b).count().min(last);
                let lo = if k == 0 { domain[0] } else { bounds[k - 1] };
                let hi = if k < bounds.len() { bounds[k] } else { domain[1] };
                let e0 = encode.get(2 * k).copied().unwrap_or(0.0);
                let e1 = encode.get(2 * k + 1).copied().unwrap_or(1.0);
                match functions.get(k) {
                    Some(f) => f.eval(&[interpolate(x, lo, hi, e0, e1)]),
                    None => Vec::new(),
                }
            }
            PdfFunction::PostScript {
                domain,
                range,
                program,
            } => {
                let mut stack: Vec<PsValue> = input
                    .iter()
                    .enumerate()
                    .map(|(i, v)| {
                        let lo = domain.get(2 * i).copied().unwrap_or(f64::MIN);
                        let hi = domain.get(2 * i + 1).copied().unwrap_or(f64::MAX);
                        PsValue::Num(clamp_between(*v, lo, hi))
                    })
                    .collect();
                run_ps(program, &mut stack);
                let n = range.len() / 2;
                let start = stack.len().saturating_sub(n);
                stack[start..]
                    .iter()
                    .enumerate()
                    .map(|(i, v)| clamp_between(v.num(), range[2 * i], range[2 * i + 1]))
                    .collect()
            }
            PdfFunction::Array(fs) => fs.iter().flat_map(|f| f.eval(input)).collect(),
        }
    }
}

impl SampledFunction {
    fn sample(&self, index: usize, output: usize, n_outputs: usize) -> f64 {
        let bps = self.bits_per_sample as usize;
        let bit_pos = (index * n_outputs + output) * bps;
        let mut value: u64 = 0;
        for bit in 0..bps {
            let pos = bit_pos + bit;
            let byte = self.samples.get(pos / 8).copied().unwrap_or(0);
            let b = (byte >> (7 - (pos % 8))) & 1;
            value = (value << 1) | u64::from(b);
        }
        value as f64
    }

    fn eval(&self, input: &[f64]) -> Vec<f64> {
        let m = self.size.len();
        let n = self.range.len() / 2;
        if m == 0 || n == 0 {
            return Vec::new();
        }
        let max_sample = ((1u64 << self.bits_per_sample.min(32)) - 1) as f64;

        // Encoded position and interpolation weights per input.
        let mut lower = vec![0usize; m];
        let mut frac = vec![0.0f64; m];
        for i in 0..m {
            let d0 = self.domain.get(2 * i).copied().unwrap_or(0.0);
            let d1 = self.domain.get(2 * i + 1).copied().unwrap_or(1.0);
            let size = self.size[i].max(1) as f64;
            let e0 = self.encode.get(2 * i).copied().unwrap_or(0.0);
            let e1 = self.encode.get(2 * i + 1).copied().unwrap_or(size - 1.0);
            let x = clamp_between(input.get(i).copied().unwrap_or(0.0), d0, d1);
            let e = clamp_between(interpolate(x, d0, d1, e0, e1), 0.0, size - 1.0);
            let floor = e.floor();
            lower[i] = floor as usize;
            frac[i] = e - floor;
        }

        let mut strides = vec![1usize; m];
        for i in 1..m {
            strides[i] = strides[i - 1] * self.size[i - 1].max(1) as usize;
        }

        let mut out = vec![0.0; n];
        for corner in 0..(1usize << m) {
            let mut weight = 1.0;
            let mut index = 0;
            for i in 0..m {
                let upper = corner & (1 << i) != 0;
                let max_index = self.size[i].max(1) as usize - 1;
                let pos = if upper { (lower[i] + 1).min(max_index) } else { lower[i] };
                weight *= if upper { frac[i] } else { 1.0 - frac[i] };
                index += pos * strides[i];
            }
            if weight == 0.0 {
                continue;
            }
            for (j, o) in out.iter_mut().enumerate() {
                *o += weight * self.sample(index, j, n);
            }
        }

        out.iter()
            .enumerate()
            .map(|(j, s)| {
                let dec0 = self.decode.get(2 * j).copied().unwrap_or(self.range[2 * j]);
                let dec1 = self.decode.get(2 * j + 1).copied().unwrap_or(self.range[2 * j + 1]);
                clamp_between(
                    interpolate(*s, 0.0, max_sample, dec0, dec1),
                    self.range[2 * j],
                    self.range[2 * j + 1],
                )
            })
            .collect()
    }
}

// --- PostScript calculator ---

/// One operation of a type 4 program.
#[derive(Debug, Clone, PartialEq)]
pub enum PsOp {
    Num(f64),
    Bool(bool),
    Op(String),
    If(Vec<PsOp>),
    IfElse(Vec<PsOp>, Vec<PsOp>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PsValue {
    Num(f64),
    Bool(bool),
}

impl PsValue {
    fn num(&self) -> f64 {
        match self {
            PsValue::Num(v) => *v,
            PsValue::Bool(b) => f64::from(u8::from(*b)),
        }
    }

    fn truthy(&self) -> bool {
        match self {
            PsValue::Num(v) => *v != 0.0,
            PsValue::Bool(b) => *b,
        }
    }
}

/// Parse a type 4 program body such as `{ 2 mul 1 exch sub }`.
pub fn parse_postscript(source: &[u8]) -> Result<Vec<PsOp>, FunctionError> {
    let text = String::from_utf8_lossy(source);
    let tokens: Vec<String> = text
        .replace('{', " { ")
        .replace('}', " } ")
        .split_whitespace()
        .map(str::to_string)
        .collect();
    let mut pos = 0;
    if tokens.first().map(String::as_str) != Some("{") {
        return Err(FunctionError("PostScript program must start with '{'".to_string()));
    }
    pos += 1;
    parse_block(&tokens, &mut pos)
}

fn parse_block(tokens: &[String], pos: &mut usize) -> Result<Vec<PsOp>, FunctionError> {
    let mut ops = Vec::new();
    let mut pending: Vec<Vec<PsOp>> = Vec::new();
    while *pos < tokens.len() {
        let tok = &tokens[*pos];
        *pos += 1;
        match tok.as_str() {
            "{" => pending.push(parse_block(tokens, pos)?),
            "}" => return Ok(ops),
            "if" => {
                let body = pending
                    .pop()
                    .ok_or_else(|| FunctionError("'if' without procedure".to_string()))?;
                ops.push(PsOp::If(body));
            }
            "ifelse" => {
                let else_body = pending.pop();
                let then_body = pending.pop();
                match (then_body, else_body) {
                    (Some(t), Some(e)) => ops.push(PsOp::IfElse(t, e)),
                    _ => return Err(FunctionError("'ifelse' needs two procedures".to_string())),
                }
            }
            "true" => ops.push(PsOp::Bool(true)),
            "false" => ops.push(PsOp::Bool(false)),
            other => match other.parse::<f64>() {
                Ok(v) => ops.push(PsOp::Num(v)),
                Err(_) => ops.push(PsOp::Op(other.to_string())),
            },
        }
    }
    Err(FunctionError("unterminated PostScript procedure".to_string()))
}

const PS_STACK_LIMIT: usize = 100;

fn run_ps(program: &[PsOp], stack: &mut Vec<PsValue>) {
    for op in program {
        if stack.len() > PS_STACK_LIMIT {
            return;
        }
        match op {
            PsOp::Num(v) => stack.push(PsValue::Num(*v)),
            PsOp::Bool(b) => stack.push(PsValue::Bool(*b)),
            PsOp::If(body) => {
                if stack.pop().is_some_and(|c| c.truthy()) {
                    run_ps(body, stack);
                }
            }
            PsOp::IfElse(then_body, else_body) => {
                if stack.pop().is_some_and(|c| c.truthy()) {
                    run_ps(then_body, stack);
                } else {
                    run_ps(else_body, stack);
                }
            }
            PsOp::Op(name) => run_ps_operator(name, stack),
        }
    }
}

fn pop(stack: &mut Vec<PsValue>) -> f64 {
    stack.pop().map_or(0.0, |v| v.num())
}

fn pop_value(stack: &mut Vec<PsValue>) -> PsValue {
    stack.pop().unwrap_or(PsValue::Num(0.0))
}

fn run_ps_operator(name: &str, stack: &mut Vec<PsValue>) {
    match name {
        "add" | "sub" | "mul" | "div" | "idiv" | "mod" | "atan" | "exp" | "bitshift" => {
            let b = pop(stack);
            let a = pop(stack);
            let v = match name {
                "add" => a + b,
                "sub" => a - b,
                "mul" => a * b,
                "div" => if b == 0.0 { 0.0 } else { a / b },
                "idiv" => if b as i64 == 0 { 0.0 } else { ((a as i64) / (b as i64)) as f64 },
                "mod" => if b as i64 == 0 { 0.0 } else { ((a as i64) % (b as i64)) as f64 },
                "atan" => {
                    let deg = a.atan2(b).to_degrees();
                    if deg < 0.0 { deg + 360.0 } else { deg }
                }
                "exp" => a.powf(b),
                _ => {
                    let (a, b) = (a as i64, b as i64);
                    (if b >= 0 { a << b.min(63) } else { a >> (-b).min(63) }) as f64
                }
            };
            stack.push(PsValue::Num(v));
        }
        "abs" | "neg" | "ceiling" | "floor" | "round" | "truncate" | "sqrt" | "sin" | "cos"
        | "ln" | "log" | "cvi" | "cvr" => {
            let a = pop(stack);
            let v = match name {
                "abs" => a.abs(),
                "neg" => -a,
                "ceiling" => a.ceil(),
                "floor" => a.floor(),
                "round" => (a + 0.5).floor(),
                "truncate" | "cvi" => a.trunc(),
                "sqrt" => a.max(0.0).sqrt(),
                "sin" => a.to_radians().sin(),
                "cos" => a.to_radians().cos(),
                "ln" => a.ln(),
                "log" => a.log10(),
                _ => a,
            };
            stack.push(PsValue::Num(v));
        }
        "eq" | "ne" | "gt" | "ge" | "lt" | "le" => {
            let b = pop(stack);
            let a = pop(stack);
            let v = match name {
                "eq" => a == b,
                "ne" => a != b,
                "gt" => a > b,
                "ge" => a >= b,
                "lt" => a < b,
                _ => a <= b,
            };
            stack.push(PsValue::Bool(v));
        }
        "and" | "or" | "xor" => {
            let b = pop_value(stack);
            let a = pop_value(stack);
            let v = match (a, b) {
                (PsValue::Bool(x), PsValue::Bool(y)) => PsValue::Bool(match name {
                    "and" => x && y,
                    "or" => x || y,
                    _ => x ^ y,
                }),
                _ => {
                    let (x, y) = (a.num() as i64, b.num() as i64);
                    PsValue::Num(match name {
                        "and" => x & y,
                        "or" => x | y,
                        _ => x ^ y,
                    } as f64)
                }
            };
            stack.push(v);
        }
        "not" => {
            let v = match pop_value(stack) {
                PsValue::Bool(b) => PsValue::Bool(!b),
                PsValue::Num(n) => PsValue::Num(!(n as i64) as f64),
            };
            stack.push(v);
        }
        "dup" => {
            if let Some(v) = stack.last().copied() {
                stack.push(v);
            }
        }
        "pop" => {
            stack.pop();
        }
        "exch" => {
            let len = stack.len();
            if len >= 2 {
                stack.swap(len - 1, len - 2);
            }
        }
        "copy" => {
            let n = pop(stack) as usize;
            if n <= stack.len() {
                let start = stack.len() - n;
                let copied: Vec<PsValue> = stack[start..].to_vec();
                stack.extend(copied);
            }
        }
        "index" => {
            let n = pop(stack) as usize;
            if n < stack.len() {
                let v = stack[stack.len() - 1 - n];
                stack.push(v);
            }
        }
        "roll" => {
            let j = pop(stack) as i64;
            let n = pop(stack) as usize;
            if n > 0 && n <= stack.len() {
                let start = stack.len() - n;
                let shift = j.rem_euclid(n as i64) as usize;
                stack[start..].rotate_right(shift);
            }
        }
        _ => {}
    }
}
