//! The NIFTY100 universe tracked by the dashboard.

const NSE_SUFFIX: &str = ".NS";

/// (Yahoo ticker, company name)
pub const NIFTY100: &[(&str, &str)] = &[
    ("ABB.NS", "ABB India"),
    ("ADANIENT.NS", "Adani Enterprises"),
    ("ADANIGREEN.NS", "Adani Green Energy"),
    ("ADANIPORTS.NS", "Adani Ports and SEZ"),
    ("ADANIPOWER.NS", "Adani Power"),
    ("AMBUJACEM.NS", "Ambuja Cements"),
    ("APOLLOHOSP.NS", "Apollo Hospitals"),
    ("ASIANPAINT.NS", "Asian Paints"),
    ("ATGL.NS", "Adani Total Gas"),
    ("AXISBANK.NS", "Axis Bank"),
    ("BAJAJ-AUTO.NS", "Bajaj Auto"),
    ("BAJAJFINSV.NS", "Bajaj Finserv"),
    ("BAJAJHLDNG.NS", "Bajaj Holdings"),
    ("BAJFINANCE.NS", "Bajaj Finance"),
    ("BANKBARODA.NS", "Bank of Baroda"),
    ("BEL.NS", "Bharat Electronics"),
    ("BERGEPAINT.NS", "Berger Paints"),
    ("BHARTIARTL.NS", "Bharti Airtel"),
    ("BOSCHLTD.NS", "Bosch"),
    ("BPCL.NS", "Bharat Petroleum"),
    ("BRITANNIA.NS", "Britannia Industries"),
    ("CANBK.NS", "Canara Bank"),
    ("CHOLAFIN.NS", "Cholamandalam Investment"),
    ("CIPLA.NS", "Cipla"),
    ("COALINDIA.NS", "Coal India"),
    ("COLPAL.NS", "Colgate-Palmolive India"),
    ("DABUR.NS", "Dabur India"),
    ("DIVISLAB.NS", "Divi's Laboratories"),
    ("DLF.NS", "DLF"),
    ("DMART.NS", "Avenue Supermarts"),
    ("DRREDDY.NS", "Dr. Reddy's Laboratories"),
    ("EICHERMOT.NS", "Eicher Motors"),
    ("GAIL.NS", "GAIL India"),
    ("GODREJCP.NS", "Godrej Consumer Products"),
    ("GRASIM.NS", "Grasim Industries"),
    ("HAL.NS", "Hindustan Aeronautics"),
    ("HAVELLS.NS", "Havells India"),
    ("HCLTECH.NS", "HCL Technologies"),
    ("HDFCBANK.NS", "HDFC Bank"),
    ("HDFCLIFE.NS", "HDFC Life Insurance"),
    ("HEROMOTOCO.NS", "Hero MotoCorp"),
    ("HINDALCO.NS", "Hindalco Industries"),
    ("HINDUNILVR.NS", "Hindustan Unilever"),
    ("ICICIBANK.NS", "ICICI Bank"),
    ("ICICIGI.NS", "ICICI Lombard General Insurance"),
    ("ICICIPRULI.NS", "ICICI Prudential Life Insurance"),
    ("INDIGO.NS", "InterGlobe Aviation"),
    ("INDUSINDBK.NS", "IndusInd Bank"),
    ("INFY.NS", "Infosys"),
    ("IOC.NS", "Indian Oil Corporation"),
    ("IRCTC.NS", "Indian Railway Catering and Tourism"),
    ("IRFC.NS", "Indian Railway Finance Corporation"),
    ("ITC.NS", "ITC"),
    ("JINDALSTEL.NS", "Jindal Steel & Power"),
    ("JIOFIN.NS", "Jio Financial Services"),
    ("JSWSTEEL.NS", "JSW Steel"),
    ("KOTAKBANK.NS", "Kotak Mahindra Bank"),
    ("LICI.NS", "Life Insurance Corporation of India"),
    ("LT.NS", "Larsen & Toubro"),
    ("LTIM.NS", "LTIMindtree"),
    ("M&M.NS", "Mahindra & Mahindra"),
    ("MARICO.NS", "Marico"),
    ("MARUTI.NS", "Maruti Suzuki India"),
    ("MOTHERSON.NS", "Samvardhana Motherson International"),
    ("NAUKRI.NS", "Info Edge (India)"),
    ("NESTLEIND.NS", "Nestle India"),
    ("NTPC.NS", "NTPC"),
    ("ONGC.NS", "Oil & Natural Gas Corporation"),
    ("PFC.NS", "Power Finance Corporation"),
    ("PIDILITIND.NS", "Pidilite Industries"),
    ("PNB.NS", "Punjab National Bank"),
    ("POWERGRID.NS", "Power Grid Corporation of India"),
    ("RECLTD.NS", "REC"),
    ("RELIANCE.NS", "Reliance Industries"),
    ("SBICARD.NS", "SBI Cards and Payment Services"),
    ("SBILIFE.NS", "SBI Life Insurance"),
    ("SBIN.NS", "State Bank of India"),
    ("SHREECEM.NS", "Shree Cement"),
    ("SHRIRAMFIN.NS", "Shriram Finance"),
    ("SIEMENS.NS", "Siemens"),
    ("SRF.NS", "SRF"),
    ("SUNPHARMA.NS", "Sun Pharmaceutical Industries"),
    ("TATACONSUM.NS", "Tata Consumer Products"),
    ("TATAMOTORS.NS", "Tata Motors"),
    ("TATAPOWER.NS", "Tata Power"),
    ("TATASTEEL.NS", "Tata Steel"),
    ("TCS.NS", "Tata Consultancy Services"),
    ("TECHM.NS", "Tech Mahindra"),
    ("TITAN.NS", "Titan Company"),
    ("TORNTPHARM.NS", "Torrent Pharmaceuticals"),
    ("TRENT.NS", "Trent"),
    ("TVSMOTOR.NS", "TVS Motor Company"),
    ("ULTRACEMCO.NS", "UltraTech Cement"),
    ("UNITDSPR.NS", "United Spirits"),
    ("VBL.NS", "Varun Beverages"),
    ("VEDL.NS", "Vedanta"),
    ("WIPRO.NS", "Wipro"),
    ("ZOMATO.NS", "Zomato"),
    ("ZYDUSLIFE.NS", "Zydus Lifesciences"),
    ("HINDPETRO.NS", "Hindustan Petroleum"),
];

pub fn tickers() -> Vec<String> {
    NIFTY100.iter().map(|(t, _)| (*t).to_string()).collect()
}

/// Exchange symbol without the `.NS` suffix.
pub fn display_symbol(ticker: &str) -> &str {
    ticker.strip_suffix(NSE_SUFFIX).unwrap_or(ticker)
}

pub fn company_name(ticker: &str) -> &str {
    NIFTY100
        .iter()
        .find(|(t, _)| *t == ticker)
        .map(|(_, name)| *name)
        .unwrap_or_else(|| display_symbol(ticker))
}

/// Accepts `RELIANCE`, `reliance.ns` or `RELIANCE.NS` and returns the universe ticker.
pub fn resolve(input: &str) -> Option<&'static str> {
    let wanted = input.trim().to_ascii_uppercase();
    let wanted = display_symbol(&wanted);
    NIFTY100
        .iter()
        .map(|(t, _)| *t)
        .find(|t| display_symbol(t) == wanted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn universe_has_one_hundred_unique_nse_tickers() {
        let set: BTreeSet<_> = NIFTY100.iter().map(|(t, _)| *t).collect();
        assert_eq!(set.len(), 100);
        assert!(NIFTY100.iter().all(|(t, _)| t.ends_with(NSE_SUFFIX)));
    }

    #[test]
    fn display_helpers_strip_suffix_and_fall_back() {
        assert_eq!(display_symbol("RELIANCE.NS"), "RELIANCE");
        assert_eq!(display_symbol("AAPL"), "AAPL");
        assert_eq!(company_name("TCS.NS"), "Tata Consultancy Services");
        assert_eq!(company_name("FOO.NS"), "FOO");
    }

    #[test]
    fn resolves_bare_and_suffixed_symbols() {
        assert_eq!(resolve("infy"), Some("INFY.NS"));
        assert_eq!(resolve("M&M.NS"), Some("M&M.NS"));
        assert_eq!(resolve("NOPE"), None);
    }
}
