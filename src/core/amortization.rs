use super::error::{EngineError, Result};
use super::types::Finance;

pub const TRANSFER_FEE_PCT: f64 = 2.0;
pub const AGENT_FEE_PCT: f64 = 3.57;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub name: &'static str,
    pub code: &'static str,
    pub transfer_tax_pct: f64,
}

const REGIONS: [Region; 16] = [
    Region { name: "Baden-Württemberg", code: "DE-BW", transfer_tax_pct: 5.0 },
    Region { name: "Bayern", code: "DE-BY", transfer_tax_pct: 3.5 },
    Region { name: "Berlin", code: "DE-BE", transfer_tax_pct: 6.0 },
    Region { name: "Brandenburg", code: "DE-BB", transfer_tax_pct: 6.5 },
    Region { name: "Bremen", code: "DE-HB", transfer_tax_pct: 5.0 },
    Region { name: "Hamburg", code: "DE-HH", transfer_tax_pct: 5.5 },
    Region { name: "Hessen", code: "DE-HE", transfer_tax_pct: 6.0 },
    Region { name: "Mecklenburg-Vorpommern", code: "DE-MV", transfer_tax_pct: 6.0 },
    Region { name: "Niedersachsen", code: "DE-NI", transfer_tax_pct: 5.0 },
    Region { name: "Nordrhein-Westfalen", code: "DE-NW", transfer_tax_pct: 6.5 },
    Region { name: "Rheinland-Pfalz", code: "DE-RP", transfer_tax_pct: 5.0 },
    Region { name: "Saarland", code: "DE-SL", transfer_tax_pct: 6.5 },
    Region { name: "Sachsen", code: "DE-SN", transfer_tax_pct: 5.5 },
    Region { name: "Sachsen-Anhalt", code: "DE-ST", transfer_tax_pct: 5.0 },
    Region { name: "Schleswig-Holstein", code: "DE-SH", transfer_tax_pct: 6.5 },
    Region { name: "Thüringen", code: "DE-TH", transfer_tax_pct: 5.0 },
];

pub fn regions() -> &'static [Region] {
    &REGIONS
}

pub fn lookup_region(name: &str) -> Result<&'static Region> {
    REGIONS
        .iter()
        .find(|region| region.name == name)
        .ok_or_else(|| EngineError::UnknownRegion(name.to_string()))
}

/// Years needed to pay off `price` (grossed up by purchase costs) when the
/// whole `capital` goes in as equity and `income * savings_fraction` is paid
/// every month. Rounded to two decimals.
pub fn solve_duration(
    price: f64,
    capital: f64,
    income: f64,
    savings_fraction: f64,
    annual_rate_pct: f64,
    region_surcharge_pct: f64,
) -> Result<f64> {
    for (name, value) in [
        ("price", price),
        ("capital", capital),
        ("income", income),
        ("savings_fraction", savings_fraction),
        ("annual_rate_pct", annual_rate_pct),
        ("region_surcharge_pct", region_surcharge_pct),
    ] {
        if !value.is_finite() {
            return Err(EngineError::InvalidInput(format!("{name} must be finite")));
        }
    }
    if annual_rate_pct < 0.0 {
        return Err(EngineError::InvalidInput(
            "annual_rate_pct must be >= 0".to_string(),
        ));
    }

    let surcharge = 1.0 + (region_surcharge_pct + TRANSFER_FEE_PCT + AGENT_FEE_PCT) / 100.0;
    let loan = price * surcharge - capital;
    if loan <= 0.0 {
        return Ok(0.0);
    }

    let monthly_payment = income * savings_fraction;
    if monthly_payment <= 0.0 {
        return Err(EngineError::InvalidInput(
            "monthly payment (income * savings_fraction) must be > 0".to_string(),
        ));
    }

    let monthly_rate = annual_rate_pct / 100.0 / 12.0;
    let months = if monthly_rate == 0.0 {
        loan / monthly_payment
    } else {
        let interest_share = loan * monthly_rate / monthly_payment;
        if interest_share >= 1.0 {
            return Err(EngineError::NonAmortizing {
                loan,
                monthly_payment,
                monthly_interest: loan * monthly_rate,
            });
        }
        (1.0 / (1.0 - interest_share)).ln() / (1.0 + monthly_rate).ln()
    };

    Ok(round_to_cents(months / 12.0))
}

pub fn solve_for_region(price: f64, finance: &Finance, region: &str) -> Result<f64> {
    let region = lookup_region(region)?;
    solve_duration(
        price,
        finance.capital,
        finance.income,
        finance.savings_fraction,
        finance.interest_rate,
        region.transfer_tax_pct,
    )
}

fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
