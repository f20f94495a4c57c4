//! The public operation surface.
//!
//! Every operation is the shared traversal plus one [`Op`] implementation
//! that knows what to do at atomic leaves: decode them through a medium's
//! codecs, encode them, convert them between two mediums in one step, or
//! just check them in place (diagnose, sanitize).

use crate::exact::Exact;
use crate::issue::{Error, IssueList, Segment, TypeIssue, TypePath};
use crate::medium::Medium;
use crate::traverse::{check_atom, walk, Op, RefineMode};
use crate::ty::{Atomic, Refinement, Type};
use crate::value::Value;

struct Decoder<'a, P> {
    medium: &'a Medium<P>,
}

impl<P> Op for Decoder<'_, P> {
    fn atom(
        &mut self,
        atom: Atomic,
        constraints: &[Refinement],
        input: &Value,
        path: &TypePath,
    ) -> (Value, Vec<TypeIssue>) {
        match (self.medium.codec(atom).decode)(input) {
            Ok(native) => {
                let issues = check_atom(atom, constraints, &native, path);
                (native, issues)
            }
            Err(message) => (input.clone(), vec![TypeIssue::new(path.clone(), message)]),
        }
    }
}

struct Encoder<'a, P> {
    medium: &'a Medium<P>,
}

impl<P> Op for Encoder<'_, P> {
    fn atom(
        &mut self,
        atom: Atomic,
        constraints: &[Refinement],
        input: &Value,
        path: &TypePath,
    ) -> (Value, Vec<TypeIssue>) {
        let issues = check_atom(atom, constraints, input, path);
        if !issues.is_empty() {
            return (input.clone(), issues);
        }
        match (self.medium.codec(atom).encode)(input) {
            Ok(wire) => (wire, issues),
            Err(message) => (input.clone(), vec![TypeIssue::new(path.clone(), message)]),
        }
    }

    fn refine_mode(&self) -> RefineMode {
        RefineMode::Stability
    }
}

struct Converter<'a, P, Q> {
    from: &'a Medium<P>,
    to: &'a Medium<Q>,
}

impl<P, Q> Op for Converter<'_, P, Q> {
    fn atom(
        &mut self,
        atom: Atomic,
        constraints: &[Refinement],
        input: &Value,
        path: &TypePath,
    ) -> (Value, Vec<TypeIssue>) {
        // Decode then re-encode in one step; the host value never fully
        // materializes outside this leaf.
        let native = match (self.from.codec(atom).decode)(input) {
            Ok(native) => native,
            Err(message) => {
                return (input.clone(), vec![TypeIssue::new(path.clone(), message)])
            }
        };
        let issues = check_atom(atom, constraints, &native, path);
        if !issues.is_empty() {
            return (native, issues);
        }
        match (self.to.codec(atom).encode)(&native) {
            Ok(wire) => (wire, issues),
            Err(message) => (native, vec![TypeIssue::new(path.clone(), message)]),
        }
    }
}

struct Diagnoser;

impl Op for Diagnoser {
    fn atom(
        &mut self,
        atom: Atomic,
        constraints: &[Refinement],
        input: &Value,
        path: &TypePath,
    ) -> (Value, Vec<TypeIssue>) {
        (input.clone(), check_atom(atom, constraints, input, path))
    }
}

struct Sanitizer;

impl Op for Sanitizer {
    fn atom(
        &mut self,
        atom: Atomic,
        constraints: &[Refinement],
        input: &Value,
        path: &TypePath,
    ) -> (Value, Vec<TypeIssue>) {
        (input.clone(), check_atom(atom, constraints, input, path))
    }

    fn lenient(&self) -> bool {
        true
    }
}

impl Type {
    /// Decode a packed payload arriving from a medium into a native value.
    pub fn decode<P>(&self, medium: &Medium<P>, packed: &P) -> Result<Value, Error> {
        let unpacked = medium.unpack(packed).map_err(|message| Error::Unpack {
            medium: medium.name().to_string(),
            message,
        })?;
        let (out, issues) = walk(
            self,
            &unpacked,
            &TypePath::root(),
            &Exact::Off,
            &mut Decoder { medium },
        );
        if issues.is_empty() {
            Ok(out)
        } else {
            Err(Error::Decode {
                medium: medium.name().to_string(),
                issues: IssueList(issues),
            })
        }
    }

    /// Encode a native value into a medium's packed representation.
    pub fn encode<P>(&self, medium: &Medium<P>, value: &Value) -> Result<P, Error> {
        let (wire, issues) = walk(
            self,
            value,
            &TypePath::root(),
            &Exact::Off,
            &mut Encoder { medium },
        );
        if !issues.is_empty() {
            return Err(Error::Encode {
                medium: medium.name().to_string(),
                issues: IssueList(issues),
            });
        }
        medium.pack(&wire).map_err(|message| Error::Pack {
            medium: medium.name().to_string(),
            message,
        })
    }

    /// Convert a packed payload between two mediums without materializing the
    /// native value. Refinements and constraints still apply in flight;
    /// only the atomic codec round trip is fused.
    pub fn convert<P, Q>(
        &self,
        from: &Medium<P>,
        to: &Medium<Q>,
        packed: &P,
    ) -> Result<Q, Error> {
        let unpacked = from.unpack(packed).map_err(|message| Error::Unpack {
            medium: from.name().to_string(),
            message,
        })?;
        let (wire, issues) = walk(
            self,
            &unpacked,
            &TypePath::root(),
            &Exact::Off,
            &mut Converter { from, to },
        );
        if !issues.is_empty() {
            return Err(Error::Convert {
                from: from.name().to_string(),
                to: to.name().to_string(),
                issues: IssueList(issues),
            });
        }
        to.pack(&wire).map_err(|message| Error::Pack {
            medium: to.name().to_string(),
            message,
        })
    }

    /// Collect every issue a native value has against this descriptor.
    /// Pure and deterministic; an empty list means the value satisfies the
    /// type.
    pub fn diagnose(&self, value: &Value) -> Vec<TypeIssue> {
        walk(
            self,
            value,
            &TypePath::root(),
            &Exact::Off,
            &mut Diagnoser,
        )
        .1
    }

    /// Side-effect-free membership test.
    pub fn is(&self, value: &Value) -> bool {
        self.diagnose(value).is_empty()
    }

    /// Assert that a native value satisfies this descriptor.
    pub fn check(&self, value: &Value) -> Result<(), Error> {
        let issues = self.diagnose(value);
        if issues.is_empty() {
            Ok(())
        } else {
            Err(Error::Check {
                issues: IssueList(issues),
            })
        }
    }

    /// Like [`Type::check`], returning the input unchanged on success.
    pub fn satisfies<'a>(&self, value: &'a Value) -> Result<&'a Value, Error> {
        self.check(value)?;
        Ok(value)
    }

    /// Best-effort cleanup: strip properties, elements, and entries that
    /// fail outright, keep everything else, and report what was wrong.
    pub fn sanitize(&self, value: &Value) -> (Value, Vec<TypeIssue>) {
        walk(
            self,
            value,
            &TypePath::root(),
            &Exact::Off,
            &mut Sanitizer,
        )
    }
}

/// Wrap a callable with argument decoding and return-value encoding against
/// one medium.
///
/// The returned closure decodes each packed argument with its descriptor
/// (issues at `[args[i]]`), applies `f` to the native arguments, and encodes
/// the result with the return descriptor.
pub fn guard<P, F>(
    arg_types: Vec<Type>,
    ret: Type,
    medium: Medium<P>,
    f: F,
) -> impl Fn(&[P]) -> Result<P, Error>
where
    F: Fn(&[Value]) -> Value,
{
    move |packed_args: &[P]| {
        if packed_args.len() != arg_types.len() {
            return Err(Error::Check {
                issues: IssueList(vec![TypeIssue::new(
                    TypePath::root(),
                    format!(
                        "Expected {} argument(s), got {}.",
                        arg_types.len(),
                        packed_args.len()
                    ),
                )]),
            });
        }
        let mut natives = Vec::with_capacity(arg_types.len());
        let mut issues = Vec::new();
        for (i, (ty, packed)) in arg_types.iter().zip(packed_args).enumerate() {
            let unpacked = medium.unpack(packed).map_err(|message| Error::Unpack {
                medium: medium.name().to_string(),
                message,
            })?;
            let path = TypePath::root().child(Segment::Arg(i));
            let (native, arg_issues) =
                walk(ty, &unpacked, &path, &Exact::Off, &mut Decoder { medium: &medium });
            issues.extend(arg_issues);
            natives.push(native);
        }
        if !issues.is_empty() {
            return Err(Error::Decode {
                medium: medium.name().to_string(),
                issues: IssueList(issues),
            });
        }
        let result = f(&natives);
        ret.encode(&medium, &result)
    }
}
