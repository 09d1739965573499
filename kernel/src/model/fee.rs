use rust_decimal::Decimal;

// 金額帯ごとの手数料率。[min, max) の半開区間で評価する
#[derive(Debug, Clone)]
pub struct FeeTier {
    pub min: Decimal,
    // None は上限なし
    pub max: Option<Decimal>,
    pub percent: Decimal,
}

// 完了済みレンタル数がしきい値に達した利用者への一律割引
#[derive(Debug, Clone)]
pub struct LoyaltyRule {
    pub threshold: u32,
    pub discount_percent: Decimal,
}

#[derive(Debug, Clone)]
pub struct FeeTable {
    pub tiers: Vec<FeeTier>,
    pub loyalty: LoyaltyRule,
}

impl Default for FeeTable {
    fn default() -> Self {
        Self {
            tiers: vec![
                FeeTier {
                    min: Decimal::ZERO,
                    max: Some(Decimal::from(50)),
                    percent: Decimal::from(15),
                },
                FeeTier {
                    min: Decimal::from(50),
                    max: Some(Decimal::from(200)),
                    percent: Decimal::from(10),
                },
                FeeTier {
                    min: Decimal::from(200),
                    max: None,
                    percent: Decimal::from(5),
                },
            ],
            loyalty: LoyaltyRule {
                threshold: 10,
                discount_percent: Decimal::from(2),
            },
        }
    }
}

impl FeeTable {
    // 金額と完了済みレンタル数から手数料率（パーセント）を求める純粋関数。
    // どの区間にも入らない金額は最後（最高額帯）の率に倒す
    pub fn fee_percent(&self, amount: Decimal, completed_count: Option<u32>) -> Decimal {
        let tier = self
            .tiers
            .iter()
            .find(|tier| amount >= tier.min && tier.max.map_or(true, |max| amount < max))
            .or_else(|| self.tiers.last());

        let base = tier.map_or(Decimal::ZERO, |tier| tier.percent);

        let discounted = match completed_count {
            Some(count) if count >= self.loyalty.threshold => {
                base - self.loyalty.discount_percent
            }
            _ => base,
        };

        // 割引で負になった場合は 0 で止める
        discounted.max(Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fee_on(amount: Decimal, percent: Decimal) -> Decimal {
        amount * percent / Decimal::ONE_HUNDRED
    }

    #[test]
    fn middle_tier_without_loyalty() {
        let table = FeeTable::default();
        let percent = table.fee_percent(Decimal::from(150), None);
        assert_eq!(percent, Decimal::from(10));
        assert_eq!(fee_on(Decimal::from(150), percent), Decimal::from(15));
    }

    #[test]
    fn loyalty_discount_applies_over_threshold() {
        let table = FeeTable::default();
        let percent = table.fee_percent(Decimal::from(150), Some(12));
        assert_eq!(percent, Decimal::from(8));
        assert_eq!(fee_on(Decimal::from(150), percent), Decimal::from(12));
    }

    #[test]
    fn loyalty_ignored_under_threshold() {
        let table = FeeTable::default();
        assert_eq!(
            table.fee_percent(Decimal::from(150), Some(9)),
            Decimal::from(10)
        );
    }

    #[test]
    fn tier_bounds_are_half_open() {
        let table = FeeTable::default();
        // 50 ちょうどは 2 番目の区間に入る
        assert_eq!(table.fee_percent(Decimal::from(50), None), Decimal::from(10));
        assert_eq!(
            table.fee_percent("49.99".parse().unwrap(), None),
            Decimal::from(15)
        );
        assert_eq!(
            table.fee_percent(Decimal::from(200), None),
            Decimal::from(5)
        );
    }

    #[test]
    fn amount_beyond_all_tiers_falls_back_to_last() {
        let table = FeeTable {
            tiers: vec![
                FeeTier {
                    min: Decimal::ZERO,
                    max: Some(Decimal::from(100)),
                    percent: Decimal::from(12),
                },
                FeeTier {
                    min: Decimal::from(100),
                    max: Some(Decimal::from(500)),
                    percent: Decimal::from(7),
                },
            ],
            loyalty: LoyaltyRule {
                threshold: 10,
                discount_percent: Decimal::from(2),
            },
        };
        assert_eq!(
            table.fee_percent(Decimal::from(10_000), None),
            Decimal::from(7)
        );
    }

    #[test]
    fn discount_never_goes_negative() {
        let table = FeeTable {
            tiers: vec![FeeTier {
                min: Decimal::ZERO,
                max: None,
                percent: Decimal::ONE,
            }],
            loyalty: LoyaltyRule {
                threshold: 1,
                discount_percent: Decimal::from(5),
            },
        };
        assert_eq!(table.fee_percent(Decimal::from(30), Some(3)), Decimal::ZERO);
    }
}
