//! Route matching for incoming beacon requests.
//!
//! Each route path is read as a pattern and scored against the request
//! path. A literal segment is worth 10 and a `:param` segment 5;
//! `/prefix/*` earns 10 per prefix segment and a bare `/*` earns nothing. The best score wins and ties go to the
//! route listed first.
//!
//! Wildcards hand the unmatched remainder of the path to the target as
//! [`TAIL_PARAM`], so `/mp/*` can forward to
//! `https://api-js.mixpanel.com/:tail`.

use std::collections::HashMap;

use crate::config::model::Route;

/// Parameter holding the path remainder captured by a wildcard route.
pub const TAIL_PARAM: &str = "tail";

const LITERAL: usize = 10;
const PARAM: usize = 5;

type Params = HashMap<String, String>;

/// Index of the best route for `method` and `path`, with its parameters.
#[must_use]
pub fn match_route(routes: &[Route], path: &str, method: &str) -> Option<(usize, Params)> {
    let request = segments(path);

    let mut best: Option<(usize, usize, Params)> = None;
    for (idx, route) in routes.iter().enumerate() {
        if !accepts(route, method) {
            continue;
        }
        let Some((score, params)) = Pattern::parse(&route.path).score(&request) else {
            continue;
        };
        if best.as_ref().map_or(true, |(top, ..)| score > *top) {
            best = Some((score, idx, params));
        }
    }

    best.map(|(_, idx, params)| (idx, params))
}

enum Pattern<'a> {
    /// `/*` or `*`
    Anything,
    /// `/prefix/*`
    Under(Vec<&'a str>),
    /// literal and `:param` segments, matched one to one
    Exactly(Vec<&'a str>),
}

impl<'a> Pattern<'a> {
    fn parse(path: &'a str) -> Self {
        if path == "*" || path == "/*" {
            return Self::Anything;
        }
        match path.strip_suffix("/*") {
            Some(prefix) => Self::Under(segments(prefix)),
            None => Self::Exactly(segments(path)),
        }
    }

    fn score(&self, request: &[&str]) -> Option<(usize, Params)> {
        match self {
            Self::Anything => Some((0, tail(request))),
            Self::Under(prefix) => {
                let rest = request.strip_prefix(prefix.as_slice())?;
                Some((prefix.len() * LITERAL, tail(rest)))
            }
            Self::Exactly(pattern) => {
                if pattern.len() != request.len() {
                    return None;
                }
                let mut params = Params::new();
                let mut score = 0;
                for (want, got) in pattern.iter().zip(request) {
                    if let Some(name) = want.strip_prefix(':') {
                        params.insert(name.to_string(), (*got).to_string());
                        score += PARAM;
                    } else if want == got {
                        score += LITERAL;
                    } else {
                        return None;
                    }
                }
                Some((score, params))
            }
        }
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn tail(rest: &[&str]) -> Params {
    Params::from([(TAIL_PARAM.to_string(), rest.join("/"))])
}

fn accepts(route: &Route, method: &str) -> bool {
    route
        .methods
        .iter()
        .any(|m| m == "*" || m.eq_ignore_ascii_case(method))
}
