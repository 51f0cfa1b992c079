//! Experience and level arithmetic.
//!
//! `xp` is the experience collected inside the current level and always stays
//! below [`XpCurve::xp_needed`] for that level. `total_xp` is lifetime
//! experience and only ever grows.

use cinesorte_common::UserProfile;

/// Requirement for leaving level `n` is `base + (n - 1) * increment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XpCurve {
    pub base: i64,
    pub increment: i64,
}

impl Default for XpCurve {
    fn default() -> Self {
        Self {
            base: 100,
            increment: 75,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub xp: i64,
    pub total_xp: i64,
    pub level: i32,
}

impl Progress {
    pub fn of(user: &UserProfile) -> Self {
        Self {
            xp: user.xp,
            total_xp: user.total_xp,
            level: user.level.max(1),
        }
    }
}

impl XpCurve {
    pub fn xp_needed(&self, level: i32) -> i64 {
        self.base + i64::from(level.max(1) - 1) * self.increment
    }

    /// Add `earned` experience, crossing as many level boundaries as it covers.
    /// Negative awards are treated as zero.
    pub fn award(&self, from: Progress, earned: i64) -> Progress {
        let earned = earned.max(0);
        let mut xp = from.xp + earned;
        let mut level = from.level.max(1);
        while xp >= self.xp_needed(level) {
            xp -= self.xp_needed(level);
            level += 1;
        }
        Progress {
            xp,
            total_xp: from.total_xp + earned,
            level,
        }
    }

    /// Apply an award to the aggregate in place. Returns the new level if it changed.
    pub fn award_user(&self, user: &mut UserProfile, earned: i64) -> Option<i32> {
        let before = Progress::of(user);
        let after = self.award(before, earned);
        user.xp = after.xp;
        user.total_xp = after.total_xp;
        user.level = after.level;
        (after.level > before.level).then_some(after.level)
    }
}

/// Cosmetic rank earned by lifetime review count. Highest satisfied rung wins.
pub fn level_title(reviews_count: i64) -> &'static str {
    match reviews_count {
        n if n >= 500 => "Divindade do Cinema",
        n if n >= 250 => "Entidade Cinematográfica",
        n if n >= 100 => "Oráculo da Sétima Arte",
        n if n >= 50 => "Mestre da Crítica",
        n if n >= 20 => "Cinéfilo Experiente",
        n if n >= 10 => "Cinéfilo",
        n if n >= 5 => "Crítico Iniciante",
        _ => "Espectador",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(level: i32, xp: i64, total_xp: i64) -> Progress {
        Progress {
            xp,
            total_xp,
            level,
        }
    }

    #[test]
    fn requirement_grows_per_level() {
        let curve = XpCurve::default();
        assert_eq!(curve.xp_needed(1), 100);
        assert_eq!(curve.xp_needed(2), 175);
        assert_eq!(curve.xp_needed(3), 250);
    }

    #[test]
    fn one_award_can_cross_two_levels() {
        let curve = XpCurve::default();
        let after = curve.award(at(1, 90, 90), 220);
        // 310 - 100 = 210 at level 2, 210 - 175 = 35 at level 3.
        assert_eq!(after, at(3, 35, 310));
    }

    #[test]
    fn below_threshold_stays_on_level() {
        let curve = XpCurve::default();
        assert_eq!(curve.award(at(1, 0, 0), 20), at(1, 20, 20));
    }

    #[test]
    fn exact_threshold_levels_up_with_zero_remainder() {
        let curve = XpCurve::default();
        assert_eq!(curve.award(at(1, 95, 95), 5), at(2, 0, 100));
    }

    #[test]
    fn total_is_sum_of_awards_across_boundaries() {
        let curve = XpCurve::default();
        let awards = [5, 10, 20, 300, 0, 75, 1000];
        let mut p = at(1, 0, 0);
        for e in awards {
            p = curve.award(p, e);
            assert!(p.xp < curve.xp_needed(p.level));
        }
        assert_eq!(p.total_xp, awards.iter().sum::<i64>());
    }

    #[test]
    fn negative_award_is_ignored() {
        let curve = XpCurve::default();
        assert_eq!(curve.award(at(2, 10, 110), -50), at(2, 10, 110));
    }

    #[test]
    fn custom_curve_is_respected() {
        let curve = XpCurve {
            base: 100,
            increment: 50,
        };
        assert_eq!(curve.award(at(1, 90, 90), 220), at(3, 60, 310));
    }

    #[test]
    fn titles_follow_review_ladder() {
        assert_eq!(level_title(0), "Espectador");
        assert_eq!(level_title(4), "Espectador");
        assert_eq!(level_title(5), "Crítico Iniciante");
        assert_eq!(level_title(10), "Cinéfilo");
        assert_eq!(level_title(20), "Cinéfilo Experiente");
        assert_eq!(level_title(50), "Mestre da Crítica");
        assert_eq!(level_title(100), "Oráculo da Sétima Arte");
        assert_eq!(level_title(250), "Entidade Cinematográfica");
        assert_eq!(level_title(10_000), "Divindade do Cinema");
    }
}
