//! Closed sets of algorithm kinds and their parameter objects, and the
//! construction of the matching algorithm instances.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LayoutError;
use crate::layout::{
    BoundedFrParams, CircularLayout, CircularParams, CompoundFdpLayout, CompoundFdpParams,
    FreeFrParams, FrLayout, IsomLayout, IsomParams, KkLayout, KkParams, LayoutAlgorithm,
    LinLogLayout, LinLogParams, RandomLayout, RandomParams,
};
use crate::overlap::{OneWayFsaParams, OverlapRemovalParams, OverlapRemover};
use crate::routing::{
    BundlingParams, BundlingRouter, EdgeRouter, PathFinderParams, PathFinderRouter, SimpleRouter,
    SimpleRouterParams,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LayoutKind {
    SimpleRandom,
    Circular,
    #[serde(alias = "FR")]
    Fr,
    #[serde(alias = "BoundedFR")]
    BoundedFr,
    #[default]
    #[serde(alias = "KK")]
    Kk,
    #[serde(alias = "ISOM")]
    Isom,
    LinLog,
    #[serde(alias = "CompoundFDP")]
    CompoundFdp,
    /// Caller-supplied positions, no algorithm.
    Custom,
}

impl LayoutKind {
    pub const ALL: [LayoutKind; 9] = [
        LayoutKind::SimpleRandom,
        LayoutKind::Circular,
        LayoutKind::Fr,
        LayoutKind::BoundedFr,
        LayoutKind::Kk,
        LayoutKind::Isom,
        LayoutKind::LinLog,
        LayoutKind::CompoundFdp,
        LayoutKind::Custom,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LayoutKind::SimpleRandom => "SimpleRandom",
            LayoutKind::Circular => "Circular",
            LayoutKind::Fr => "FR",
            LayoutKind::BoundedFr => "BoundedFR",
            LayoutKind::Kk => "KK",
            LayoutKind::Isom => "ISOM",
            LayoutKind::LinLog => "LinLog",
            LayoutKind::CompoundFdp => "CompoundFDP",
            LayoutKind::Custom => "Custom",
        }
    }

    /// Whether the algorithm fails without a size for every vertex.
    pub fn needs_sizes(self) -> bool {
        matches!(self, LayoutKind::CompoundFdp)
    }

    /// `Custom` has no parameters.
    pub fn default_params(self) -> Option<LayoutParams> {
        Some(match self {
            LayoutKind::SimpleRandom => LayoutParams::Random(RandomParams::default()),
            LayoutKind::Circular => LayoutParams::Circular(CircularParams::default()),
            LayoutKind::Fr => LayoutParams::FreeFr(FreeFrParams::default()),
            LayoutKind::BoundedFr => LayoutParams::BoundedFr(BoundedFrParams::default()),
            LayoutKind::Kk => LayoutParams::Kk(KkParams::default()),
            LayoutKind::Isom => LayoutParams::Isom(IsomParams::default()),
            LayoutKind::LinLog => LayoutParams::LinLog(LinLogParams::default()),
            LayoutKind::CompoundFdp => LayoutParams::CompoundFdp(CompoundFdpParams::default()),
            LayoutKind::Custom => return None,
        })
    }
}

impl std::str::FromStr for LayoutKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LayoutKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown layout algorithm `{s}`"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LayoutParams {
    Random(RandomParams),
    Circular(CircularParams),
    FreeFr(FreeFrParams),
    BoundedFr(BoundedFrParams),
    Kk(KkParams),
    Isom(IsomParams),
    LinLog(LinLogParams),
    CompoundFdp(CompoundFdpParams),
}

impl LayoutParams {
    pub fn name(&self) -> &'static str {
        match self {
            LayoutParams::Random(_) => "RandomParams",
            LayoutParams::Circular(_) => "CircularParams",
            LayoutParams::FreeFr(_) => "FreeFrParams",
            LayoutParams::BoundedFr(_) => "BoundedFrParams",
            LayoutParams::Kk(_) => "KkParams",
            LayoutParams::Isom(_) => "IsomParams",
            LayoutParams::LinLog(_) => "LinLogParams",
            LayoutParams::CompoundFdp(_) => "CompoundFdpParams",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OverlapRemovalKind {
    #[default]
    None,
    #[serde(alias = "FSA")]
    Fsa,
    #[serde(alias = "OneWayFSA")]
    OneWayFsa,
}

impl OverlapRemovalKind {
    pub const ALL: [OverlapRemovalKind; 3] = [
        OverlapRemovalKind::None,
        OverlapRemovalKind::Fsa,
        OverlapRemovalKind::OneWayFsa,
    ];

    pub fn name(self) -> &'static str {
        match self {
            OverlapRemovalKind::None => "None",
            OverlapRemovalKind::Fsa => "FSA",
            OverlapRemovalKind::OneWayFsa => "OneWayFSA",
        }
    }

    pub fn default_params(self) -> Option<OverlapParams> {
        match self {
            OverlapRemovalKind::None => None,
            OverlapRemovalKind::Fsa => Some(OverlapParams::Fsa(OverlapRemovalParams::default())),
            OverlapRemovalKind::OneWayFsa => {
                Some(OverlapParams::OneWayFsa(OneWayFsaParams::default()))
            }
        }
    }
}

impl std::str::FromStr for OverlapRemovalKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OverlapRemovalKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown overlap removal algorithm `{s}`"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OverlapParams {
    Fsa(OverlapRemovalParams),
    OneWayFsa(OneWayFsaParams),
}

impl OverlapParams {
    pub fn name(&self) -> &'static str {
        match self {
            OverlapParams::Fsa(_) => "OverlapRemovalParams",
            OverlapParams::OneWayFsa(_) => "OneWayFsaParams",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EdgeRoutingKind {
    #[default]
    None,
    #[serde(alias = "SimpleER")]
    Simple,
    PathFinder,
    Bundling,
}

impl EdgeRoutingKind {
    pub const ALL: [EdgeRoutingKind; 4] = [
        EdgeRoutingKind::None,
        EdgeRoutingKind::Simple,
        EdgeRoutingKind::PathFinder,
        EdgeRoutingKind::Bundling,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EdgeRoutingKind::None => "None",
            EdgeRoutingKind::Simple => "SimpleER",
            EdgeRoutingKind::PathFinder => "PathFinder",
            EdgeRoutingKind::Bundling => "Bundling",
        }
    }

    /// Routers that steer around vertex rectangles need every vertex size.
    pub fn needs_sizes(self) -> bool {
        matches!(self, EdgeRoutingKind::Simple | EdgeRoutingKind::PathFinder)
    }

    pub fn default_params(self) -> Option<RoutingParams> {
        match self {
            EdgeRoutingKind::None => None,
            EdgeRoutingKind::Simple => Some(RoutingParams::Simple(SimpleRouterParams::default())),
            EdgeRoutingKind::PathFinder => {
                Some(RoutingParams::PathFinder(PathFinderParams::default()))
            }
            EdgeRoutingKind::Bundling => Some(RoutingParams::Bundling(BundlingParams::default())),
        }
    }
}

impl std::str::FromStr for EdgeRoutingKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EdgeRoutingKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown edge routing algorithm `{s}`"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RoutingParams {
    Simple(SimpleRouterParams),
    PathFinder(PathFinderParams),
    Bundling(BundlingParams),
}

impl RoutingParams {
    pub fn name(&self) -> &'static str {
        match self {
            RoutingParams::Simple(_) => "SimpleRouterParams",
            RoutingParams::PathFinder(_) => "PathFinderParams",
            RoutingParams::Bundling(_) => "BundlingParams",
        }
    }
}

/// `params` when given, the kind's defaults otherwise.
fn resolve<P: Clone>(kind: &'static str, params: Option<&P>, defaults: Option<P>) -> Option<P> {
    match params {
        Some(params) => Some(params.clone()),
        None => {
            debug!(algorithm = kind, "using default parameters");
            defaults
        }
    }
}

fn mismatch(algorithm: &'static str, expected: &'static str, actual: &'static str) -> LayoutError {
    LayoutError::ParameterMismatch {
        algorithm,
        expected,
        actual,
    }
}

/// Builds the layout algorithm for `kind`; `Ok(None)` for [`LayoutKind::Custom`].
pub fn create_layout(
    kind: LayoutKind,
    params: Option<&LayoutParams>,
    seed: Option<u64>,
) -> Result<Option<Box<dyn LayoutAlgorithm>>, LayoutError> {
    let Some(params) = resolve(kind.name(), params, kind.default_params()) else {
        return Ok(None);
    };
    let algorithm: Box<dyn LayoutAlgorithm> = match (kind, params) {
        (LayoutKind::SimpleRandom, LayoutParams::Random(p)) => Box::new(RandomLayout::new(p, seed)),
        (LayoutKind::Circular, LayoutParams::Circular(p)) => Box::new(CircularLayout::new(p)),
        (LayoutKind::Fr, LayoutParams::FreeFr(p)) => Box::new(FrLayout::free(p, seed)),
        (LayoutKind::BoundedFr, LayoutParams::BoundedFr(p)) => Box::new(FrLayout::bounded(p, seed)),
        (LayoutKind::Kk, LayoutParams::Kk(p)) => Box::new(KkLayout::new(p, seed)),
        (LayoutKind::Isom, LayoutParams::Isom(p)) => Box::new(IsomLayout::new(p, seed)),
        (LayoutKind::LinLog, LayoutParams::LinLog(p)) => Box::new(LinLogLayout::new(p, seed)),
        (LayoutKind::CompoundFdp, LayoutParams::CompoundFdp(p)) => {
            Box::new(CompoundFdpLayout::new(p, seed))
        }
        (kind, params) => {
            let expected = kind
                .default_params()
                .map(|p| p.name())
                .unwrap_or("no parameters");
            return Err(mismatch(kind.name(), expected, params.name()));
        }
    };
    Ok(Some(algorithm))
}

/// Builds the overlap remover for `kind`; `Ok(None)` for [`OverlapRemovalKind::None`].
pub fn create_overlap_remover(
    kind: OverlapRemovalKind,
    params: Option<&OverlapParams>,
) -> Result<Option<OverlapRemover>, LayoutError> {
    let Some(params) = resolve(kind.name(), params, kind.default_params()) else {
        return Ok(None);
    };
    match (kind, params) {
        (OverlapRemovalKind::Fsa, OverlapParams::Fsa(p)) => Ok(Some(OverlapRemover::Fsa(p))),
        (OverlapRemovalKind::OneWayFsa, OverlapParams::OneWayFsa(p)) => {
            Ok(Some(OverlapRemover::OneWayFsa(p)))
        }
        (kind, params) => {
            let expected = kind
                .default_params()
                .map(|p| p.name())
                .unwrap_or("no parameters");
            Err(mismatch(kind.name(), expected, params.name()))
        }
    }
}

/// Builds the edge router for `kind`; `Ok(None)` for [`EdgeRoutingKind::None`].
pub fn create_router(
    kind: EdgeRoutingKind,
    params: Option<&RoutingParams>,
) -> Result<Option<Box<dyn EdgeRouter>>, LayoutError> {
    let Some(params) = resolve(kind.name(), params, kind.default_params()) else {
        return Ok(None);
    };
    let router: Box<dyn EdgeRouter> = match (kind, params) {
        (EdgeRoutingKind::Simple, RoutingParams::Simple(p)) => Box::new(SimpleRouter::new(p)),
        (EdgeRoutingKind::PathFinder, RoutingParams::PathFinder(p)) => {
            Box::new(PathFinderRouter::new(p))
        }
        (EdgeRoutingKind::Bundling, RoutingParams::Bundling(p)) => Box::new(BundlingRouter::new(p)),
        (kind, params) => {
            let expected = kind
                .default_params()
                .map(|p| p.name())
                .unwrap_or("no parameters");
            return Err(mismatch(kind.name(), expected, params.name()));
        }
    };
    Ok(Some(router))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_layout_kind_builds_with_defaults() {
        for kind in LayoutKind::ALL {
            let built = create_layout(kind, None, Some(1)).unwrap();
            match built {
                Some(algorithm) => {
                    assert!(algorithm.name().eq_ignore_ascii_case(kind.name()), "{kind:?}");
                    assert_eq!(algorithm.needs_sizes(), kind.needs_sizes());
                }
                None => assert_eq!(kind, LayoutKind::Custom),
            }
        }
    }

    #[test]
    fn mismatched_parameters_are_rejected() {
        let err = create_layout(
            LayoutKind::Kk,
            Some(&LayoutParams::Isom(IsomParams::default())),
            None,
        )
        .err()
        .unwrap();
        assert_eq!(
            err,
            LayoutError::ParameterMismatch {
                algorithm: "KK",
                expected: "KkParams",
                actual: "IsomParams",
            }
        );

        let err = create_router(
            EdgeRoutingKind::PathFinder,
            Some(&RoutingParams::Simple(SimpleRouterParams::default())),
        )
        .err()
        .unwrap();
        assert!(matches!(err, LayoutError::ParameterMismatch { .. }));

        let err = create_overlap_remover(
            OverlapRemovalKind::None,
            Some(&OverlapParams::Fsa(OverlapRemovalParams::default())),
        )
        .unwrap_err();
        assert_eq!(
            err,
            LayoutError::ParameterMismatch {
                algorithm: "None",
                expected: "no parameters",
                actual: "OverlapRemovalParams",
            }
        );
    }

    #[test]
    fn none_kinds_build_nothing() {
        assert!(create_overlap_remover(OverlapRemovalKind::None, None).unwrap().is_none());
        assert!(create_router(EdgeRoutingKind::None, None).unwrap().is_none());
        assert_eq!(
            create_router(EdgeRoutingKind::Bundling, None).unwrap().map(|r| r.name()),
            Some("Bundling")
        );
    }

    #[test]
    fn kinds_parse_from_display_names() {
        assert_eq!("bundling".parse::<EdgeRoutingKind>(), Ok(EdgeRoutingKind::Bundling));
        assert_eq!("SimpleER".parse::<EdgeRoutingKind>(), Ok(EdgeRoutingKind::Simple));
        assert_eq!("boundedfr".parse::<LayoutKind>(), Ok(LayoutKind::BoundedFr));
        assert_eq!("OneWayFSA".parse::<OverlapRemovalKind>(), Ok(OverlapRemovalKind::OneWayFsa));
        assert!("spring".parse::<LayoutKind>().is_err());
    }
}
