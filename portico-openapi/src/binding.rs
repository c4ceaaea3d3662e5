//! Field-binding plans (spec.md §4.6.1): turns a tagged `I` into a decoder
//! built once at registration time, reused for every request.
//!
//! `r2e-macros`' codegen builds this same shape of decoder from a
//! `#[derive(...)]`-driven schema walk at compile time; this crate carries
//! no proc-macro companion (see `DESIGN.md`), so the plan is assembled by
//! hand through `Binding::<I>::new().path(...).query(...)...` builder calls
//! instead of derived code. The fieldlet lists stay sorted by name so
//! lookup is the binary search spec.md calls for.

use std::str::FromStr;

use axum::extract::{FromRequest, Multipart, Request};
use portico_core::error::PorticoError;
use portico_core::file::CompletedFile;
use portico_core::form::{FormReader, FormReaderOptions, Part};
use portico_core::router::PathValue;
use serde::de::DeserializeOwned;
use serde_json::Value;
use schemars::JsonSchema;

/// Where a top-level field of `I` is sourced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Path,
    Query,
    Header,
    Body,
    Form,
}

/// Documentation-facing metadata carried alongside a binding, independent of
/// how the value is actually parsed.
#[derive(Debug, Clone, Default)]
pub struct FieldOptions {
    pub description: Option<&'static str>,
    pub required: bool,
    pub deprecated: bool,
}

impl FieldOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn description(mut self, desc: &'static str) -> Self {
        self.description = Some(desc);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }
}

/// Parameter metadata surfaced to `operation.rs` for OpenAPI parameter
/// objects; one per path/query/header fieldlet.
#[derive(Debug, Clone)]
pub struct ParameterMeta {
    pub location: Location,
    pub name: &'static str,
    pub options: FieldOptions,
}

type ScalarSetter<I> = Box<dyn Fn(&mut I, &str) -> Result<(), PorticoError> + Send + Sync>;
type FileSetter<I> = Box<dyn Fn(&mut I, CompletedFile) -> Result<(), PorticoError> + Send + Sync>;

struct Fieldlet<I> {
    name: &'static str,
    options: FieldOptions,
    set: ScalarSetter<I>,
}

struct FileFieldlet<I> {
    name: &'static str,
    options: FieldOptions,
    set: FileSetter<I>,
}

struct BodyBinding<I> {
    schema: Value,
    set: Box<dyn Fn(&mut I, &[u8]) -> Result<(), PorticoError> + Send + Sync>,
}

fn insert_sorted<T>(list: &mut Vec<T>, name: &'static str, item: T, key: impl Fn(&T) -> &'static str) {
    let idx = list.binary_search_by(|probe| key(probe).cmp(name)).unwrap_or_else(|i| i);
    list.insert(idx, item);
}

fn lookup<'a, T>(list: &'a [T], name: &str, key: impl Fn(&T) -> &'a str) -> Option<&'a T> {
    list.binary_search_by(|probe| key(probe).cmp(name)).ok().map(|i| &list[i])
}

/// A precomputed decoder for a request-input type `I`. Built once at
/// registration time (`spec.md` §4.6.1's "compile-time specialization"),
/// reused for every request matching the owning operation.
///
/// `I` must implement `Default` so fields left unbound by an empty input
/// resolve to their zero value, per §4.6.1's tie-break rule.
pub struct Binding<I> {
    path: Vec<Fieldlet<I>>,
    query: Vec<Fieldlet<I>>,
    header: Vec<Fieldlet<I>>,
    body: Option<BodyBinding<I>>,
    form_text: Vec<Fieldlet<I>>,
    form_file: Vec<FileFieldlet<I>>,
}

impl<I: Default> Default for Binding<I> {
    fn default() -> Self {
        Self {
            path: Vec::new(),
            query: Vec::new(),
            header: Vec::new(),
            body: None,
            form_text: Vec::new(),
            form_file: Vec::new(),
        }
    }
}

impl<I: Default + Send + Sync + 'static> Binding<I> {
    pub fn new() -> Self {
        Self::default()
    }

    fn scalar<T>(setter: fn(&mut I, T)) -> ScalarSetter<I>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        Box::new(move |input, raw| {
            let parsed = raw
                .parse::<T>()
                .map_err(|e| PorticoError::Decode(format!("{e}")))?;
            setter(input, parsed);
            Ok(())
        })
    }

    fn json_scalar<T>(setter: fn(&mut I, T)) -> ScalarSetter<I>
    where
        T: DeserializeOwned,
    {
        Box::new(move |input, raw| {
            let parsed: T = serde_json::from_str(raw)
                .map_err(|e| PorticoError::Decode(format!("{e}")))?;
            setter(input, parsed);
            Ok(())
        })
    }

    /// Bind a scalar path segment (`{name}` capture).
    pub fn path<T>(mut self, name: &'static str, options: FieldOptions, setter: fn(&mut I, T)) -> Self
    where
        T: FromStr + 'static,
        T::Err: std::fmt::Display,
    {
        insert_sorted(
            &mut self.path,
            name,
            Fieldlet { name, options, set: Self::scalar(setter) },
            |f| f.name,
        );
        self
    }

    /// Bind a path segment whose value is a nested structure, decoded as
    /// JSON from the raw captured text (§4.6.1's "nested structures
    /// decoded as JSON").
    pub fn path_json<T>(mut self, name: &'static str, options: FieldOptions, setter: fn(&mut I, T)) -> Self
    where
        T: DeserializeOwned + 'static,
    {
        insert_sorted(
            &mut self.path,
            name,
            Fieldlet { name, options, set: Self::json_scalar(setter) },
            |f| f.name,
        );
        self
    }

    /// Bind a scalar query parameter.
    pub fn query<T>(mut self, name: &'static str, options: FieldOptions, setter: fn(&mut I, T)) -> Self
    where
        T: FromStr + 'static,
        T::Err: std::fmt::Display,
    {
        insert_sorted(
            &mut self.query,
            name,
            Fieldlet { name, options, set: Self::scalar(setter) },
            |f| f.name,
        );
        self
    }

    /// Bind a query parameter decoded as JSON from its raw value.
    pub fn query_json<T>(mut self, name: &'static str, options: FieldOptions, setter: fn(&mut I, T)) -> Self
    where
        T: DeserializeOwned + 'static,
    {
        insert_sorted(
            &mut self.query,
            name,
            Fieldlet { name, options, set: Self::json_scalar(setter) },
            |f| f.name,
        );
        self
    }

    /// Bind a scalar request header.
    pub fn header<T>(mut self, name: &'static str, options: FieldOptions, setter: fn(&mut I, T)) -> Self
    where
        T: FromStr + 'static,
        T::Err: std::fmt::Display,
    {
        insert_sorted(
            &mut self.header,
            name,
            Fieldlet { name, options, set: Self::scalar(setter) },
            |f| f.name,
        );
        self
    }

    /// Bind a header decoded as JSON from its raw value.
    pub fn header_json<T>(mut self, name: &'static str, options: FieldOptions, setter: fn(&mut I, T)) -> Self
    where
        T: DeserializeOwned + 'static,
    {
        insert_sorted(
            &mut self.header,
            name,
            Fieldlet { name, options, set: Self::json_scalar(setter) },
            |f| f.name,
        );
        self
    }

    /// Bind the whole request body as JSON. Mutually exclusive with
    /// `form_field`/`form_file` — `register()` rejects a `Binding` carrying
    /// both (§4.6.1).
    pub fn body<B>(mut self, setter: fn(&mut I, B)) -> Self
    where
        B: DeserializeOwned + JsonSchema + 'static,
    {
        let schema = serde_json::to_value(schemars::schema_for!(B)).unwrap();
        self.body = Some(BodyBinding {
            schema,
            set: Box::new(move |input, bytes| {
                let parsed: B = serde_json::from_slice(bytes)
                    .map_err(|e| PorticoError::Decode(format!("body: {e}")))?;
                setter(input, parsed);
                Ok(())
            }),
        });
        self
    }

    /// Bind a scalar `multipart/form-data` text part.
    pub fn form_field<T>(mut self, name: &'static str, options: FieldOptions, setter: fn(&mut I, T)) -> Self
    where
        T: FromStr + 'static,
        T::Err: std::fmt::Display,
    {
        insert_sorted(
            &mut self.form_text,
            name,
            Fieldlet { name, options, set: Self::scalar(setter) },
            |f| f.name,
        );
        self
    }

    /// Bind a `multipart/form-data` file part.
    pub fn form_file(mut self, name: &'static str, options: FieldOptions, setter: fn(&mut I, CompletedFile)) -> Self {
        insert_sorted(
            &mut self.form_file,
            name,
            FileFieldlet { name, options, set: Box::new(move |input, file| {
                setter(input, file);
                Ok(())
            }) },
            |f| f.name,
        );
        self
    }

    /// `true` if both a body and form fields were bound — a configuration
    /// error `register()` rejects before the binding ever serves traffic.
    pub fn has_conflicting_body_and_form(&self) -> bool {
        self.body.is_some() && (!self.form_text.is_empty() || !self.form_file.is_empty())
    }

    /// Parameter metadata for OpenAPI operation assembly, path/query/header
    /// in that order.
    pub fn parameters(&self) -> Vec<ParameterMeta> {
        let mut out = Vec::with_capacity(self.path.len() + self.query.len() + self.header.len());
        for f in &self.path {
            out.push(ParameterMeta { location: Location::Path, name: f.name, options: f.options.clone() });
        }
        for f in &self.query {
            out.push(ParameterMeta { location: Location::Query, name: f.name, options: f.options.clone() });
        }
        for f in &self.header {
            out.push(ParameterMeta { location: Location::Header, name: f.name, options: f.options.clone() });
        }
        out
    }

    /// The request body's JSON Schema, if a body was bound.
    pub fn request_body_schema(&self) -> Option<&Value> {
        self.body.as_ref().map(|b| &b.schema)
    }

    /// Run the decoder: path → query → header → body-or-form, each leaving
    /// unmatched fields at `I::default()`'s value (§4.6.1).
    pub async fn decode(&self, req: Request) -> Result<I, PorticoError> {
        let mut value = I::default();

        if !self.path.is_empty() {
            if let Some(pv) = req.extensions().get::<PathValue>() {
                for f in &self.path {
                    if let Some(raw) = pv.value(f.name) {
                        (f.set)(&mut value, &raw)?;
                    }
                }
            }
        }

        if !self.query.is_empty() {
            if let Some(query) = req.uri().query() {
                for (k, v) in form_urlencoded::parse(query.as_bytes()) {
                    if let Some(f) = lookup(&self.query, &k, |f| f.name) {
                        (f.set)(&mut value, &v)?;
                    }
                }
            }
        }

        if !self.header.is_empty() {
            for (name, header_value) in req.headers() {
                let Ok(raw) = header_value.to_str() else { continue };
                if let Some(f) = lookup(&self.header, name.as_str(), |f| f.name) {
                    (f.set)(&mut value, raw)?;
                }
            }
        }

        if let Some(body) = &self.body {
            let bytes = axum::body::to_bytes(req.into_body(), usize::MAX)
                .await
                .map_err(|e| PorticoError::Decode(format!("body: {e}")))?;
            if !bytes.is_empty() {
                (body.set)(&mut value, &bytes)?;
            }
        } else if !self.form_text.is_empty() || !self.form_file.is_empty() {
            let multipart = Multipart::from_request(req, &())
                .await
                .map_err(|e| PorticoError::Decode(format!("form: {e}")))?;
            let reader = FormReader::from_multipart(multipart, &FormReaderOptions::default())
                .await
                .map_err(|e| PorticoError::Decode(e.to_string()))?;
            for part in reader.parts() {
                match part {
                    Part::Text { name, value: raw } => {
                        if let Some(f) = lookup(&self.form_text, name, |f| f.name) {
                            (f.set)(&mut value, raw)?;
                        }
                    }
                    Part::File(file) => {
                        if let Some(f) = lookup(&self.form_file, &file.field_name, |f| f.name) {
                            (f.set)(&mut value, file.clone())?;
                        }
                    }
                }
            }
        }

        Ok(value)
    }
}
