use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::Error;

/// 向量距离度量，距离越小越相似
#[derive(
    ValueEnum, Serialize, Deserialize, ToSchema, Debug, Clone, Copy, Default, PartialEq, Eq, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// 欧氏距离（平方）
    #[default]
    #[value(alias = "euclidean")]
    #[serde(alias = "euclidean")]
    L2,
    /// 余弦距离，即 1 - 余弦相似度
    Cosine,
    /// 点积距离，即 1 - 点积
    Dot,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::L2 => "l2",
            Self::Cosine => "cosine",
            Self::Dot => "dot",
        }
    }

    /// 计算两个等长向量之间的距离
    #[inline]
    pub fn distance(&self, va: &[f32], vb: &[f32]) -> f32 {
        debug_assert_eq!(va.len(), vb.len());
        match self {
            Self::L2 => l2(va, vb),
            Self::Cosine => cosine(va, vb),
            Self::Dot => 1. - dot(va, vb),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "l2" | "euclidean" => Ok(Self::L2),
            "cosine" => Ok(Self::Cosine),
            "dot" => Ok(Self::Dot),
            _ => Err(Error::UnknownMetric(s.to_owned())),
        }
    }
}

#[inline(always)]
pub fn l2(va: &[f32], vb: &[f32]) -> f32 {
    va.iter().zip(vb).map(|(a, b)| (a - b) * (a - b)).sum()
}

#[inline(always)]
pub fn dot(va: &[f32], vb: &[f32]) -> f32 {
    va.iter().zip(vb).map(|(a, b)| a * b).sum()
}

/// 任一向量为零向量时，视为正交
#[inline(always)]
pub fn cosine(va: &[f32], vb: &[f32]) -> f32 {
    let norm = (dot(va, va) * dot(vb, vb)).sqrt();
    if norm == 0. {
        return 1.;
    }
    1. - dot(va, vb) / norm
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_metric() {
        assert_eq!("l2".parse::<Metric>().unwrap(), Metric::L2);
        assert_eq!("Euclidean".parse::<Metric>().unwrap(), Metric::L2);
        assert_eq!("cosine".parse::<Metric>().unwrap(), Metric::Cosine);
        assert_eq!("dot".parse::<Metric>().unwrap(), Metric::Dot);
        assert!(matches!("hamming".parse::<Metric>(), Err(Error::UnknownMetric(s)) if s == "hamming"));
    }

    #[test]
    fn metric_distances() {
        let a = [1., 0., 0.];
        let b = [0., 1., 0.];
        assert_eq!(Metric::L2.distance(&a, &b), 2.);
        assert_eq!(Metric::L2.distance(&a, &a), 0.);
        assert!((Metric::Cosine.distance(&a, &b) - 1.).abs() < 1e-6);
        assert!(Metric::Cosine.distance(&a, &[2., 0., 0.]).abs() < 1e-6);
        assert_eq!(Metric::Dot.distance(&a, &a), 0.);
        assert_eq!(Metric::Dot.distance(&a, &b), 1.);
    }

    #[test]
    fn cosine_zero_vector() {
        assert_eq!(cosine(&[0., 0.], &[1., 1.]), 1.);
    }
}
