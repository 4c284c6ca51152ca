//! SGP4 near-Earth propagation of mean element sets.
//!
//! Follows the revised model published by Vallado et al. ("Revisiting Spacetrack
//! Report #3", 2006) with WGS-72 constants, which is what element sets are
//! generated against. Positions are in the TEME frame.

use std::f64::consts::TAU;

use chrono::{DateTime, Utc};

use crate::elements::ElementSet;
use crate::predict::error::PropagationError;

const EARTH_RADIUS_KM: f64 = 6378.135;
/// sqrt(GM / R³) in earth radii per minute.
const XKE: f64 = 0.074_366_916_133_173_42;
const J2: f64 = 0.001_082_616;
const J3: f64 = -0.000_002_538_81;
const J4: f64 = -0.000_001_655_97;
const J3_OVER_J2: f64 = J3 / J2;
const TWO_THIRDS: f64 = 2.0 / 3.0;
const VELOCITY_KM_S: f64 = EARTH_RADIUS_KM * XKE / 60.0;
const DEEP_SPACE_PERIOD_MINUTES: f64 = 225.0;
const KEPLER_TOLERANCE: f64 = 1e-12;
const KEPLER_MAX_ITERATIONS: usize = 10;

/// Position (km) and velocity (km/s) in the TEME frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateVector {
    pub position: [f64; 3],
    pub velocity: [f64; 3],
}

/// Epoch-dependent SGP4 coefficients for one element set.
#[derive(Debug, Clone)]
pub struct Propagator {
    epoch: DateTime<Utc>,
    bstar: f64,
    inclination: f64,
    right_ascension: f64,
    eccentricity: f64,
    argument_of_perigee: f64,
    mean_anomaly: f64,
    /// Brouwer mean motion (rad/min).
    mean_motion: f64,
    simplified: bool,
    aycof: f64,
    con41: f64,
    cc1: f64,
    cc4: f64,
    cc5: f64,
    d2: f64,
    d3: f64,
    d4: f64,
    delmo: f64,
    eta: f64,
    argpdot: f64,
    omgcof: f64,
    sinmao: f64,
    t2cof: f64,
    t3cof: f64,
    t4cof: f64,
    t5cof: f64,
    x1mth2: f64,
    x7thm1: f64,
    mdot: f64,
    nodedot: f64,
    xlcof: f64,
    xmcof: f64,
    nodecf: f64,
}

impl Propagator {
    pub fn new(elements: &ElementSet) -> Result<Self, PropagationError> {
        let eccentricity = elements.eccentricity;
        if !(0.0..1.0).contains(&eccentricity) {
            return Err(PropagationError::Eccentricity(eccentricity));
        }
        let kozai_mean_motion = elements.mean_motion_rev_per_day * TAU / 1440.0;
        if kozai_mean_motion <= 0.0 {
            return Err(PropagationError::MeanMotion);
        }

        let inclination = elements.inclination_deg.to_radians();
        let argument_of_perigee = elements.argument_of_perigee_deg.to_radians();
        let mean_anomaly = elements.mean_anomaly_deg.to_radians();
        let bstar = elements.drag_term;

        // Recover the Brouwer mean motion and semi-major axis from the Kozai values.
        let eccsq = eccentricity * eccentricity;
        let omeosq = 1.0 - eccsq;
        let rteosq = omeosq.sqrt();
        let cosio = inclination.cos();
        let cosio2 = cosio * cosio;
        let ak = (XKE / kozai_mean_motion).powf(TWO_THIRDS);
        let d1 = 0.75 * J2 * (3.0 * cosio2 - 1.0) / (rteosq * omeosq);
        let del = d1 / (ak * ak);
        let adel = ak * (1.0 - del * del - del * (1.0 / 3.0 + 134.0 * del * del / 81.0));
        let del = d1 / (adel * adel);
        let mean_motion = kozai_mean_motion / (1.0 + del);

        let period_minutes = TAU / mean_motion;
        if period_minutes >= DEEP_SPACE_PERIOD_MINUTES {
            return Err(PropagationError::DeepSpace { period_minutes });
        }

        let ao = (XKE / mean_motion).powf(TWO_THIRDS);
        let sinio = inclination.sin();
        let po = ao * omeosq;
        let con42 = 1.0 - 5.0 * cosio2;
        let con41 = -con42 - cosio2 - cosio2;
        let posq = po * po;
        let rp = ao * (1.0 - eccentricity);

        // Perigees below 220 km use the simplified drag model.
        let simplified = rp < 220.0 / EARTH_RADIUS_KM + 1.0;

        let mut sfour = 78.0 / EARTH_RADIUS_KM + 1.0;
        let mut qzms24 = ((120.0 - 78.0) / EARTH_RADIUS_KM).powi(4);
        let perigee_km = (rp - 1.0) * EARTH_RADIUS_KM;
        if perigee_km < 156.0 {
            sfour = if perigee_km < 98.0 {
                20.0
            } else {
                perigee_km - 78.0
            };
            qzms24 = ((120.0 - sfour) / EARTH_RADIUS_KM).powi(4);
            sfour = sfour / EARTH_RADIUS_KM + 1.0;
        }

        let pinvsq = 1.0 / posq;
        let tsi = 1.0 / (ao - sfour);
        let eta = ao * eccentricity * tsi;
        let etasq = eta * eta;
        let eeta = eccentricity * eta;
        let psisq = (1.0 - etasq).abs();
        let coef = qzms24 * tsi.powi(4);
        let coef1 = coef / psisq.powf(3.5);
        let cc2 = coef1
            * mean_motion
            * (ao * (1.0 + 1.5 * etasq + eeta * (4.0 + etasq))
                + 0.375 * J2 * tsi / psisq * con41 * (8.0 + 3.0 * etasq * (8.0 + etasq)));
        let cc1 = bstar * cc2;
        let cc3 = if eccentricity > 1.0e-4 {
            -2.0 * coef * tsi * J3_OVER_J2 * mean_motion * sinio / eccentricity
        } else {
            0.0
        };
        let x1mth2 = 1.0 - cosio2;
        let cc4 = 2.0
            * mean_motion
            * coef1
            * ao
            * omeosq
            * (eta * (2.0 + 0.5 * etasq) + eccentricity * (0.5 + 2.0 * etasq)
                - J2 * tsi / (ao * psisq)
                    * (-3.0 * con41 * (1.0 - 2.0 * eeta + etasq * (1.5 - 0.5 * eeta))
                        + 0.75
                            * x1mth2
                            * (2.0 * etasq - eeta * (1.0 + etasq))
                            * (2.0 * argument_of_perigee).cos()));
        let cc5 = 2.0 * coef1 * ao * omeosq * (1.0 + 2.75 * (etasq + eeta) + eeta * etasq);

        let cosio4 = cosio2 * cosio2;
        let temp1 = 1.5 * J2 * pinvsq * mean_motion;
        let temp2 = 0.5 * temp1 * J2 * pinvsq;
        let temp3 = -0.46875 * J4 * pinvsq * pinvsq * mean_motion;
        let mdot = mean_motion
            + 0.5 * temp1 * rteosq * con41
            + 0.0625 * temp2 * rteosq * (13.0 - 78.0 * cosio2 + 137.0 * cosio4);
        let argpdot = -0.5 * temp1 * con42
            + 0.0625 * temp2 * (7.0 - 114.0 * cosio2 + 395.0 * cosio4)
            + temp3 * (3.0 - 36.0 * cosio2 + 49.0 * cosio4);
        let xhdot1 = -temp1 * cosio;
        let nodedot =
            xhdot1 + (0.5 * temp2 * (4.0 - 19.0 * cosio2) + 2.0 * temp3 * (3.0 - 7.0 * cosio2)) * cosio;

        let omgcof = bstar * cc3 * argument_of_perigee.cos();
        let xmcof = if eccentricity > 1.0e-4 {
            -TWO_THIRDS * coef * bstar / eeta
        } else {
            0.0
        };
        let nodecf = 3.5 * omeosq * xhdot1 * cc1;
        let t2cof = 1.5 * cc1;
        // Avoid the singularity at exactly retrograde equatorial orbits.
        let xlcof_divisor = if (cosio + 1.0).abs() > 1.5e-12 {
            1.0 + cosio
        } else {
            1.5e-12
        };
        let xlcof = -0.25 * J3_OVER_J2 * sinio * (3.0 + 5.0 * cosio) / xlcof_divisor;
        let aycof = -0.5 * J3_OVER_J2 * sinio;
        let delmo = (1.0 + eta * mean_anomaly.cos()).powi(3);
        let sinmao = mean_anomaly.sin();
        let x7thm1 = 7.0 * cosio2 - 1.0;

        let (mut d2, mut d3, mut d4, mut t3cof, mut t4cof, mut t5cof) =
            (0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        if !simplified {
            let cc1sq = cc1 * cc1;
            d2 = 4.0 * ao * tsi * cc1sq;
            let temp = d2 * tsi * cc1 / 3.0;
            d3 = (17.0 * ao + sfour) * temp;
            d4 = 0.5 * temp * ao * tsi * (221.0 * ao + 31.0 * sfour) * cc1;
            t3cof = d2 + 2.0 * cc1sq;
            t4cof = 0.25 * (3.0 * d3 + cc1 * (12.0 * d2 + 10.0 * cc1sq));
            t5cof = 0.2
                * (3.0 * d4
                    + 12.0 * cc1 * d3
                    + 6.0 * d2 * d2
                    + 15.0 * cc1sq * (2.0 * d2 + cc1sq));
        }

        Ok(Self {
            epoch: elements.epoch,
            bstar,
            inclination,
            right_ascension: elements.right_ascension_deg.to_radians(),
            eccentricity,
            argument_of_perigee,
            mean_anomaly,
            mean_motion,
            simplified,
            aycof,
            con41,
            cc1,
            cc4,
            cc5,
            d2,
            d3,
            d4,
            delmo,
            eta,
            argpdot,
            omgcof,
            sinmao,
            t2cof,
            t3cof,
            t4cof,
            t5cof,
            x1mth2,
            x7thm1,
            mdot,
            nodedot,
            xlcof,
            xmcof,
            nodecf,
        })
    }

    pub fn minutes_since_epoch(&self, instant: DateTime<Utc>) -> f64 {
        let elapsed = instant - self.epoch;
        match elapsed.num_microseconds() {
            Some(us) => us as f64 / 60e6,
            None => elapsed.num_milliseconds() as f64 / 60e3,
        }
    }

    pub fn propagate(&self, instant: DateTime<Utc>) -> Result<StateVector, PropagationError> {
        self.propagate_minutes(self.minutes_since_epoch(instant))
    }

    /// Propagate to `t` minutes after the element set epoch.
    pub fn propagate_minutes(&self, t: f64) -> Result<StateVector, PropagationError> {
        // Secular gravity and atmospheric drag.
        let xmdf = self.mean_anomaly + self.mdot * t;
        let argpdf = self.argument_of_perigee + self.argpdot * t;
        let nodedf = self.right_ascension + self.nodedot * t;
        let mut argpm = argpdf;
        let mut mm = xmdf;
        let t2 = t * t;
        let mut nodem = nodedf + self.nodecf * t2;
        let mut tempa = 1.0 - self.cc1 * t;
        let mut tempe = self.bstar * self.cc4 * t;
        let mut templ = self.t2cof * t2;

        if !self.simplified {
            let delomg = self.omgcof * t;
            let delm = self.xmcof * ((1.0 + self.eta * xmdf.cos()).powi(3) - self.delmo);
            let temp = delomg + delm;
            mm = xmdf + temp;
            argpm = argpdf - temp;
            let t3 = t2 * t;
            let t4 = t3 * t;
            tempa = tempa - self.d2 * t2 - self.d3 * t3 - self.d4 * t4;
            tempe += self.bstar * self.cc5 * (mm.sin() - self.sinmao);
            templ += self.t3cof * t3 + t4 * (self.t4cof + t * self.t5cof);
        }

        let am = (XKE / self.mean_motion).powf(TWO_THIRDS) * tempa * tempa;
        let nm = XKE / am.powf(1.5);
        let mut em = self.eccentricity - tempe;
        if !(-0.001..1.0).contains(&em) {
            return Err(PropagationError::Eccentricity(em));
        }
        if em < 1.0e-6 {
            em = 1.0e-6;
        }
        mm += self.mean_motion * templ;
        let xlm = mm + argpm + nodem;

        nodem %= TAU;
        argpm %= TAU;
        let xlm = xlm % TAU;
        mm = (xlm - argpm - nodem) % TAU;

        let sinip = self.inclination.sin();
        let cosip = self.inclination.cos();

        // Long-period periodics.
        let axnl = em * argpm.cos();
        let temp = 1.0 / (am * (1.0 - em * em));
        let aynl = em * argpm.sin() + temp * self.aycof;
        let xl = mm + argpm + nodem + temp * self.xlcof * axnl;

        // Kepler's equation in the modified form.
        let u = (xl - nodem) % TAU;
        let mut eo1 = u;
        let mut sineo1 = eo1.sin();
        let mut coseo1 = eo1.cos();
        for _ in 0..KEPLER_MAX_ITERATIONS {
            sineo1 = eo1.sin();
            coseo1 = eo1.cos();
            let mut step = (u - aynl * coseo1 + axnl * sineo1 - eo1)
                / (1.0 - coseo1 * axnl - sineo1 * aynl);
            if step.abs() >= 0.95 {
                step = 0.95_f64.copysign(step);
            }
            eo1 += step;
            if step.abs() < KEPLER_TOLERANCE {
                break;
            }
        }

        // Short-period periodics.
        let ecose = axnl * coseo1 + aynl * sineo1;
        let esine = axnl * sineo1 - aynl * coseo1;
        let el2 = axnl * axnl + aynl * aynl;
        let pl = am * (1.0 - el2);
        if pl < 0.0 {
            return Err(PropagationError::SemiLatusRectum);
        }

        let rl = am * (1.0 - ecose);
        let rdotl = am.sqrt() * esine / rl;
        let rvdotl = pl.sqrt() / rl;
        let betal = (1.0 - el2).sqrt();
        let temp = esine / (1.0 + betal);
        let sinu = am / rl * (sineo1 - aynl - axnl * temp);
        let cosu = am / rl * (coseo1 - axnl + aynl * temp);
        let mut su = sinu.atan2(cosu);
        let sin2u = (cosu + cosu) * sinu;
        let cos2u = 1.0 - 2.0 * sinu * sinu;
        let temp = 1.0 / pl;
        let temp1 = 0.5 * J2 * temp;
        let temp2 = temp1 * temp;

        let mrt = rl * (1.0 - 1.5 * temp2 * betal * self.con41)
            + 0.5 * temp1 * self.x1mth2 * cos2u;
        su -= 0.25 * temp2 * self.x7thm1 * sin2u;
        let xnode = nodem + 1.5 * temp2 * cosip * sin2u;
        let xinc = self.inclination + 1.5 * temp2 * cosip * sinip * cos2u;
        let mvt = rdotl - nm * temp1 * self.x1mth2 * sin2u / XKE;
        let rvdot = rvdotl + nm * temp1 * (self.x1mth2 * cos2u + 1.5 * self.con41) / XKE;

        if mrt < 1.0 {
            return Err(PropagationError::Decayed { minutes: t });
        }

        // Orientation vectors.
        let (sinsu, cossu) = su.sin_cos();
        let (snod, cnod) = xnode.sin_cos();
        let (sini, cosi) = xinc.sin_cos();
        let xmx = -snod * cosi;
        let xmy = cnod * cosi;
        let ux = xmx * sinsu + cnod * cossu;
        let uy = xmy * sinsu + snod * cossu;
        let uz = sini * sinsu;
        let vx = xmx * cossu - cnod * sinsu;
        let vy = xmy * cossu - snod * sinsu;
        let vz = sini * cossu;

        Ok(StateVector {
            position: [
                mrt * ux * EARTH_RADIUS_KM,
                mrt * uy * EARTH_RADIUS_KM,
                mrt * uz * EARTH_RADIUS_KM,
            ],
            velocity: [
                (mvt * ux + rvdot * vx) * VELOCITY_KM_S,
                (mvt * uy + rvdot * vy) * VELOCITY_KM_S,
                (mvt * uz + rvdot * vz) * VELOCITY_KM_S,
            ],
        })
    }
}

/// Propagate `elements` to `instant`.
pub fn propagate(elements: &ElementSet, instant: DateTime<Utc>) -> Result<StateVector, PropagationError> {
    Propagator::new(elements)?.propagate(instant)
}
