// Trophy rules. A rule unlocks once per user and is never revoked.

use chrono::{DateTime, Utc};

use cinesorte_common::{Trophy, UserProfile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criterion {
    Reviews,
    Watched,
    TotalXp,
    Followers,
    /// Whole 30-day months since the account was created.
    AccountAge,
}

#[derive(Debug, Clone, Copy)]
pub struct TrophyRule {
    pub id: &'static str,
    pub title: &'static str,
    pub icon: &'static str,
    pub criterion: Criterion,
    pub threshold: i64,
}

const fn rule(
    id: &'static str,
    title: &'static str,
    criterion: Criterion,
    threshold: i64,
    icon: &'static str,
) -> TrophyRule {
    TrophyRule {
        id,
        title,
        icon,
        criterion,
        threshold,
    }
}

pub const RULES: &[TrophyRule] = &[
    rule("wat_10", "Iniciando a Coleção", Criterion::Watched, 10, "Play"),
    rule("wat_50", "Maratonista de Respeito", Criterion::Watched, 50, "Flame"),
    rule("wat_100", "Cinéfilo Dedicado", Criterion::Watched, 100, "MonitorPlay"),
    rule("wat_500", "Viciado em Telas", Criterion::Watched, 500, "Film"),
    rule("wat_1000", "Olhos de Titânio", Criterion::Watched, 1000, "Eye"),
    rule("rev_1", "Primeira de Muitas", Criterion::Reviews, 1, "PenTool"),
    rule("rev_10", "Crítico em Ascensão", Criterion::Reviews, 10, "Zap"),
    rule("rev_50", "Lenda das Reviews", Criterion::Reviews, 50, "Crown"),
    rule("rev_100", "A Voz da Razão", Criterion::Reviews, 100, "Mic2"),
    rule("rev_500", "O Próprio Roteiro", Criterion::Reviews, 500, "Feather"),
    rule("xp_1000", "Veterano do CineSorte", Criterion::TotalXp, 1000, "Shield"),
    rule("xp_5000", "Mestre do XP", Criterion::TotalXp, 5000, "ShieldCheck"),
    rule("xp_20000", "Lenda Viva", Criterion::TotalXp, 20000, "Star"),
    rule("soc_10", "Popular na Roda", Criterion::Followers, 10, "Users"),
    rule("soc_100", "Influenciador", Criterion::Followers, 100, "Radio"),
    rule("soc_1000", "Celebridade", Criterion::Followers, 1000, "Camera"),
    rule("vet_1", "Novato Promissor", Criterion::AccountAge, 1, "Baby"),
    rule("vet_6", "Habitué do Cinema", Criterion::AccountAge, 6, "Coffee"),
    rule("vet_12", "Veterano Real", Criterion::AccountAge, 12, "Medal"),
    rule("vet_36", "Ancestral", Criterion::AccountAge, 36, "Hourglass"),
];

pub fn account_age_months(created_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - created_at).num_days().max(0) / 30
}

/// Trophies newly earned for each `(criterion, value)` check, plus any
/// account-age trophies due at `now`. Rules the user already holds are
/// skipped, and each id appears at most once in the result.
///
/// `AccountAge` passed as a check is ignored: age always comes from `created_at`.
pub fn evaluate(user: &UserProfile, checks: &[(Criterion, i64)], now: DateTime<Utc>) -> Vec<Trophy> {
    let age = account_age_months(user.created_at, now);

    RULES
        .iter()
        .filter(|r| !user.has_trophy(r.id))
        .filter(|r| match r.criterion {
            Criterion::AccountAge => age >= r.threshold,
            criterion => checks
                .iter()
                .any(|(c, value)| *c == criterion && *value >= r.threshold),
        })
        .map(|r| Trophy {
            id: r.id.to_string(),
            title: r.title.to_string(),
            icon: r.icon.to_string(),
            awarded_at: now,
        })
        .collect()
}

/// Evaluate and union the result into the aggregate. Returns what was added.
pub fn unlock(user: &mut UserProfile, checks: &[(Criterion, i64)], now: DateTime<Utc>) -> Vec<Trophy> {
    let earned = evaluate(user, checks, now);
    user.merge_trophies(&earned);
    earned
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn fresh(now: DateTime<Utc>) -> UserProfile {
        UserProfile::new("u1", "Ana", "ana", "a@b.c", now)
    }

    fn ids(trophies: &[Trophy]) -> Vec<&str> {
        trophies.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn rule_ids_are_unique() {
        let mut seen = std::collections::HashSet::new();
        assert!(RULES.iter().all(|r| seen.insert(r.id)));
    }

    #[test]
    fn first_review_unlocks_rev_1() {
        let now = Utc::now();
        let earned = evaluate(&fresh(now), &[(Criterion::Reviews, 1)], now);
        assert_eq!(ids(&earned), vec!["rev_1"]);
    }

    #[test]
    fn skipped_thresholds_catch_up_together() {
        let now = Utc::now();
        let earned = evaluate(&fresh(now), &[(Criterion::Watched, 120)], now);
        assert_eq!(ids(&earned), vec!["wat_10", "wat_50", "wat_100"]);
    }

    #[test]
    fn held_trophy_is_never_reawarded() {
        let now = Utc::now();
        let mut user = fresh(now);
        unlock(&mut user, &[(Criterion::Followers, 10)], now);
        assert!(user.has_trophy("soc_10"));

        // Value regresses below the threshold and back above it.
        assert!(evaluate(&user, &[(Criterion::Followers, 3)], now).is_empty());
        assert!(evaluate(&user, &[(Criterion::Followers, 10)], now).is_empty());
        assert_eq!(user.trophies.len(), 1);
    }

    #[test]
    fn other_dimensions_do_not_match() {
        let now = Utc::now();
        let earned = evaluate(&fresh(now), &[(Criterion::TotalXp, 999_999)], now);
        assert!(earned.iter().all(|t| t.id.starts_with("xp_")));
        assert_eq!(earned.len(), 3);
    }

    #[test]
    fn account_age_uses_created_at_once() {
        let now = Utc::now();
        let mut user = fresh(now - Duration::days(200));
        user.trophies.clear();
        let earned = evaluate(
            &user,
            &[(Criterion::Reviews, 0), (Criterion::TotalXp, 0), (Criterion::AccountAge, 99)],
            now,
        );
        assert_eq!(ids(&earned), vec!["vet_1", "vet_6"]);
    }

    #[test]
    fn months_are_thirty_day_blocks() {
        let now = Utc::now();
        assert_eq!(account_age_months(now - Duration::days(29), now), 0);
        assert_eq!(account_age_months(now - Duration::days(30), now), 1);
        assert_eq!(account_age_months(now + Duration::days(5), now), 0);
    }
}
