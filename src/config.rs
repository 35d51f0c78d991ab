use std::env;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use tracing::{info, warn};

use crate::containment::{ContainmentConfig, EvaluationStrategy};
use crate::geometry::{CupProfile, MIN_SEGMENTS, SamplingStrategy};
use crate::model::{ClearanceMargin, Container, OriginConvention, ValidationError};
use crate::session::FitSession;
use crate::types::Point3;

/// Lookup of a single configuration variable; `None` when unset or blank.
type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Complete application configuration, loaded from environment variables or default values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub containment: ContainmentSettings,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(&env_string)
    }

    /// Creates a configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: Lookup<'_>) -> Self {
        Self {
            api: ApiConfig::from_lookup(lookup),
            containment: ContainmentSettings::from_lookup(lookup),
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
}

impl ApiConfig {
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_BIND_IP: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
    const DEFAULT_PORT: u16 = 8080;
    const HOST_VAR: &'static str = "FIT_CHECK_API_HOST";
    const PORT_VAR: &'static str = "FIT_CHECK_API_PORT";

    fn from_lookup(lookup: Lookup<'_>) -> Self {
        let host_value = lookup(Self::HOST_VAR).unwrap_or_else(|| Self::DEFAULT_HOST.to_string());
        let (bind_ip, effective_host) = match host_value.parse::<IpAddr>() {
            Ok(ip) => (ip, host_value),
            Err(err) => {
                warn!(
                    "⚠️ Could not parse {} ('{}'): {}. Using {}.",
                    Self::HOST_VAR,
                    host_value,
                    err,
                    Self::DEFAULT_HOST
                );
                (Self::DEFAULT_BIND_IP, Self::DEFAULT_HOST.to_string())
            }
        };

        let port = match lookup(Self::PORT_VAR) {
            Some(raw) => match raw.parse::<u16>() {
                Ok(value) if value != 0 => value,
                Ok(_) => {
                    warn!(
                        "⚠️ {} must not be 0. Using {}.",
                        Self::PORT_VAR,
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
                Err(err) => {
                    warn!(
                        "⚠️ Could not parse {} ('{}'): {}. Using {}.",
                        Self::PORT_VAR,
                        raw,
                        err,
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
            },
            None => Self::DEFAULT_PORT,
        };

        Self {
            bind_ip,
            display_host: effective_host,
            port,
        }
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Visible hostname for logging and hints.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    /// Configured port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Indicates whether binding to all interfaces.
    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }

    /// Checks whether the hostname matches the default value.
    pub fn uses_default_host(&self) -> bool {
        self.display_host == Self::DEFAULT_HOST
    }
}

/// Configuration for the containment check and the session built from it.
#[derive(Clone, Debug)]
pub struct ContainmentSettings {
    containment: ContainmentConfig,
    sampling: SamplingStrategy,
    segments: usize,
    trailing_evaluation: bool,
    min_extent: f64,
    max_extent: f64,
    rest_position: Point3,
}

impl ContainmentSettings {
    pub const DEFAULT_SEGMENTS: usize = 32;
    pub const MAX_SEGMENTS: usize = 1024;
    pub const DEFAULT_TRAILING_EVALUATION: bool = true;
    pub const DEFAULT_MIN_EXTENT: f64 = 1.0;
    pub const DEFAULT_MAX_EXTENT: f64 = 50.0;
    pub const DEFAULT_CONTAINER_DIMS: (f64, f64, f64) = (15.0, 10.0, 15.0);

    const ORIGIN_VAR: &'static str = "FIT_CHECK_ORIGIN";
    const STRATEGY_VAR: &'static str = "FIT_CHECK_STRATEGY";
    const SAMPLING_VAR: &'static str = "FIT_CHECK_SAMPLING";
    const SEGMENTS_VAR: &'static str = "FIT_CHECK_RIM_SEGMENTS";
    const MARGIN_VAR: &'static str = "FIT_CHECK_MARGIN";
    const MIN_INTERVAL_VAR: &'static str = "FIT_CHECK_MIN_INTERVAL_MS";
    const CHECK_VERTICAL_VAR: &'static str = "FIT_CHECK_CHECK_VERTICAL";
    const TRAILING_VAR: &'static str = "FIT_CHECK_TRAILING_EVALUATION";
    const MIN_EXTENT_VAR: &'static str = "FIT_CHECK_MIN_EXTENT";
    const MAX_EXTENT_VAR: &'static str = "FIT_CHECK_MAX_EXTENT";
    const REST_X_VAR: &'static str = "FIT_CHECK_REST_X";

    fn from_lookup(lookup: Lookup<'_>) -> Self {
        let origin = lookup(Self::ORIGIN_VAR)
            .and_then(|raw| parse_choice(&raw, Self::ORIGIN_VAR, parse_origin))
            .unwrap_or_default();

        let strategy = lookup(Self::STRATEGY_VAR)
            .and_then(|raw| parse_choice(&raw, Self::STRATEGY_VAR, parse_strategy))
            .unwrap_or_default();

        let sampling = lookup(Self::SAMPLING_VAR)
            .and_then(|raw| parse_choice(&raw, Self::SAMPLING_VAR, parse_sampling))
            .unwrap_or_default();

        let segments = load_f64_with_warning(
            lookup,
            Self::SEGMENTS_VAR,
            Self::DEFAULT_SEGMENTS as f64,
            |value| {
                value.fract() == 0.0
                    && value >= MIN_SEGMENTS as f64
                    && value <= Self::MAX_SEGMENTS as f64
            },
            "must be a whole number between 4 and 1024",
            "Adjusted segment count changes how closely rims are sampled",
        ) as usize;

        let margin_value = load_f64_with_warning(
            lookup,
            Self::MARGIN_VAR,
            0.0,
            |value| value >= 0.0 && value.is_finite(),
            "must be zero or positive",
            "Clearance margin shrinks the usable container floor",
        );
        // The validator above already rejected negative and non-finite values.
        let margin = ClearanceMargin::new(margin_value).unwrap_or_default();

        let min_interval_ms = load_f64_with_warning(
            lookup,
            Self::MIN_INTERVAL_VAR,
            ContainmentConfig::DEFAULT_MIN_INTERVAL_MS as f64,
            |value| value.fract() == 0.0 && (0.0..=60_000.0).contains(&value),
            "must be a whole number of milliseconds between 0 and 60000",
            "Adjusted evaluation interval changes how stale a verdict may be",
        ) as u64;

        let check_vertical = lookup(Self::CHECK_VERTICAL_VAR)
            .and_then(|raw| parse_bool(&raw, Self::CHECK_VERTICAL_VAR))
            .unwrap_or(ContainmentConfig::DEFAULT_CHECK_VERTICAL);

        let trailing_evaluation = lookup(Self::TRAILING_VAR)
            .and_then(|raw| parse_bool(&raw, Self::TRAILING_VAR))
            .unwrap_or(Self::DEFAULT_TRAILING_EVALUATION);

        let mut min_extent = load_f64_with_warning(
            lookup,
            Self::MIN_EXTENT_VAR,
            Self::DEFAULT_MIN_EXTENT,
            |value| value > 0.0,
            "must be greater than 0",
            "Adjusted extent range changes which container sizes are accepted",
        );
        let mut max_extent = load_f64_with_warning(
            lookup,
            Self::MAX_EXTENT_VAR,
            Self::DEFAULT_MAX_EXTENT,
            |value| value > 0.0,
            "must be greater than 0",
            "Adjusted extent range changes which container sizes are accepted",
        );
        if min_extent > max_extent {
            warn!(
                "⚠️ {} ({}) exceeds {} ({}). Using {}..={}.",
                Self::MIN_EXTENT_VAR,
                min_extent,
                Self::MAX_EXTENT_VAR,
                max_extent,
                Self::DEFAULT_MIN_EXTENT,
                Self::DEFAULT_MAX_EXTENT
            );
            min_extent = Self::DEFAULT_MIN_EXTENT;
            max_extent = Self::DEFAULT_MAX_EXTENT;
        }

        let rest_x = load_f64_with_warning(
            lookup,
            Self::REST_X_VAR,
            FitSession::DEFAULT_REST_POSITION.x,
            f64::is_finite,
            "must be a finite number",
            "Adjusted rest position moves the separated body",
        );

        let containment = ContainmentConfig::builder()
            .origin(origin)
            .margin(margin)
            .strategy(strategy)
            .min_interval(Duration::from_millis(min_interval_ms))
            .check_vertical(check_vertical)
            .build();

        Self {
            containment,
            sampling,
            segments,
            trailing_evaluation,
            min_extent,
            max_extent,
            rest_position: Point3::new(rest_x, 0.0, 0.0),
        }
    }

    pub fn containment_config(&self) -> ContainmentConfig {
        self.containment
    }

    pub fn sampling(&self) -> SamplingStrategy {
        self.sampling
    }

    pub fn segments(&self) -> usize {
        self.segments
    }

    /// Whether suppressed edits are re-evaluated once the interval reopens.
    pub fn trailing_evaluation(&self) -> bool {
        self.trailing_evaluation
    }

    /// Accepted container extents, inclusive.
    pub fn extent_range(&self) -> (f64, f64) {
        (self.min_extent, self.max_extent)
    }

    pub fn rest_position(&self) -> Point3 {
        self.rest_position
    }

    /// Builds the cup session the service starts with.
    pub fn build_session(&self) -> Result<FitSession, ValidationError> {
        let body = CupProfile::default().sample(self.sampling, self.segments);
        let container = Container::new(Self::DEFAULT_CONTAINER_DIMS, self.containment.origin)?;
        info!(
            origin = self.containment.origin.code(),
            strategy = self.containment.strategy.code(),
            sampling = self.sampling.code(),
            vertices = body.local_vertices().len(),
            "📦 Fit session ready"
        );
        Ok(FitSession::new(
            body,
            container,
            self.containment,
            self.rest_position,
        ))
    }
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            warn!(
                "⚠️ Access to {} failed: {}. Using default value.",
                name, err
            );
            None
        }
    }
}

fn parse_bool(raw: &str, var_name: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        other => {
            warn!(
                "⚠️ Could not interpret {} ('{}') as boolean value. Using default value.",
                var_name, other
            );
            None
        }
    }
}

fn parse_origin(raw: &str) -> Option<OriginConvention> {
    match raw {
        "centered" | "center" => Some(OriginConvention::Centered),
        "corner" | "corner_anchored" => Some(OriginConvention::CornerAnchored),
        _ => None,
    }
}

fn parse_strategy(raw: &str) -> Option<EvaluationStrategy> {
    match raw {
        "closed_form" | "analytic" => Some(EvaluationStrategy::ClosedForm),
        "point_set" | "points" => Some(EvaluationStrategy::PointSet),
        _ => None,
    }
}

fn parse_sampling(raw: &str) -> Option<SamplingStrategy> {
    match raw {
        "exact" | "mesh" => Some(SamplingStrategy::Exact),
        "analytic" => Some(SamplingStrategy::Analytic),
        _ => None,
    }
}

fn parse_choice<T>(raw: &str, var_name: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
    let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
    let parsed = parse(&normalized);
    if parsed.is_none() {
        warn!(
            "⚠️ Could not interpret {} ('{}'). Using default value.",
            var_name, raw
        );
    }
    parsed
}

fn load_f64_with_warning(
    lookup: Lookup<'_>,
    var_name: &str,
    default: f64,
    validator: impl Fn(f64) -> bool,
    invalid_hint: &str,
    warning: &str,
) -> f64 {
    match lookup(var_name) {
        Some(raw) => match raw.parse::<f64>() {
            Ok(value) => {
                if !validator(value) {
                    warn!(
                        "⚠️ {} contains invalid value '{}': {}. Using {}.",
                        var_name, raw, invalid_hint, default
                    );
                    default
                } else {
                    let tolerance = (default.abs().max(1.0)) * 1e-9;
                    if (value - default).abs() > tolerance {
                        info!("⚠️ {} ({} = {}).", warning, var_name, value);
                    }
                    value
                }
            }
            Err(err) => {
                warn!(
                    "⚠️ Could not parse {} ('{}') as number: {}. Using {}.",
                    var_name, raw, err, default
                );
                default
            }
        },
        None => default,
    }
}
