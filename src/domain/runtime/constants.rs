//! Predefined terminal constants (`OP_*`, `MODE_*`, `PRICE_*`, colors, ...).

use crate::domain::runtime::value::Value;

pub const EMPTY_VALUE: f64 = 2_147_483_647.0;

/// Look up a predefined constant by name.
pub fn lookup(name: &str) -> Option<Value> {
    if let Some(v) = integer(name) {
        return Some(Value::Int(v));
    }
    Some(Value::Double(match name {
        "EMPTY_VALUE" => EMPTY_VALUE,
        "DBL_MAX" => f64::MAX,
        "DBL_MIN" => f64::MIN_POSITIVE,
        "DBL_EPSILON" => f64::EPSILON,
        "FLT_MAX" => f32::MAX as f64,
        "FLT_MIN" => f32::MIN_POSITIVE as f64,
        "M_PI" => std::f64::consts::PI,
        "M_E" => std::f64::consts::E,
        _ => return None,
    }))
}

fn integer(name: &str) -> Option<i64> {
    Some(match name {
        // order types
        "OP_BUY" => 0,
        "OP_SELL" => 1,
        "OP_BUYLIMIT" => 2,
        "OP_SELLLIMIT" => 3,
        "OP_BUYSTOP" => 4,
        "OP_SELLSTOP" => 5,
        // order selection
        "SELECT_BY_POS" => 0,
        "SELECT_BY_TICKET" => 1,
        "MODE_TRADES" => 0,
        "MODE_HISTORY" => 1,
        // applied prices
        "PRICE_CLOSE" => 0,
        "PRICE_OPEN" => 1,
        "PRICE_HIGH" => 2,
        "PRICE_LOW" => 3,
        "PRICE_MEDIAN" => 4,
        "PRICE_TYPICAL" => 5,
        "PRICE_WEIGHTED" => 6,
        // moving average methods
        "MODE_SMA" => 0,
        "MODE_EMA" => 1,
        "MODE_SMMA" => 2,
        "MODE_LWMA" => 3,
        // indicator lines
        "MODE_MAIN" => 0,
        "MODE_SIGNAL" => 1,
        "MODE_HISTOGRAM" => 2,
        "MODE_UPPER" => 1,
        "MODE_LOWER" => 2,
        "MODE_PLUSDI" => 1,
        "MODE_MINUSDI" => 2,
        "MODE_GATORJAW" => 1,
        "MODE_GATORTEETH" => 2,
        "MODE_GATORLIPS" => 3,
        "MODE_TENKANSEN" => 1,
        "MODE_KIJUNSEN" => 2,
        "MODE_SENKOUSPANA" => 3,
        "MODE_SENKOUSPANB" => 4,
        "MODE_CHIKOUSPAN" => 5,
        // series identifiers for iHighest/iLowest
        "MODE_OPEN" => 0,
        "MODE_LOW" => 1,
        "MODE_HIGH" => 2,
        "MODE_CLOSE" => 3,
        "MODE_VOLUME" => 4,
        "MODE_TIME" => 5,
        // MarketInfo
        "MODE_BID" => 9,
        "MODE_ASK" => 10,
        "MODE_POINT" => 11,
        "MODE_DIGITS" => 12,
        "MODE_SPREAD" => 13,
        "MODE_STOPLEVEL" => 14,
        "MODE_LOTSIZE" => 15,
        "MODE_TICKVALUE" => 16,
        "MODE_TICKSIZE" => 17,
        "MODE_MINLOT" => 23,
        "MODE_LOTSTEP" => 24,
        "MODE_MAXLOT" => 25,
        // timeframes
        "PERIOD_CURRENT" => 0,
        "PERIOD_M1" => 1,
        "PERIOD_M5" => 5,
        "PERIOD_M15" => 15,
        "PERIOD_M30" => 30,
        "PERIOD_H1" => 60,
        "PERIOD_H4" => 240,
        "PERIOD_D1" => 1440,
        "PERIOD_W1" => 10080,
        "PERIOD_MN1" => 43200,
        // account / symbol / terminal properties
        "ACCOUNT_BALANCE" => 37,
        "ACCOUNT_CREDIT" => 38,
        "ACCOUNT_PROFIT" => 39,
        "ACCOUNT_EQUITY" => 40,
        "ACCOUNT_MARGIN" => 41,
        "ACCOUNT_MARGIN_FREE" => 42,
        "ACCOUNT_LOGIN" => 0,
        "ACCOUNT_LEVERAGE" => 35,
        "ACCOUNT_NAME" => 1,
        "ACCOUNT_SERVER" => 3,
        "ACCOUNT_CURRENCY" => 36,
        "ACCOUNT_COMPANY" => 2,
        "SYMBOL_BID" => 1,
        "SYMBOL_ASK" => 4,
        "SYMBOL_POINT" => 16,
        "SYMBOL_DIGITS" => 17,
        "SYMBOL_SPREAD" => 18,
        "SYMBOL_TIME" => 15,
        "TERMINAL_CONNECTED" => 6,
        "TERMINAL_TRADE_ALLOWED" => 8,
        "TERMINAL_BUILD" => 5,
        "SERIES_BARS_COUNT" => 0,
        "SERIES_FIRSTDATE" => 1,
        "SERIES_LASTBAR_DATE" => 5,
        // TimeToString flags
        "TIME_DATE" => 1,
        "TIME_MINUTES" => 2,
        "TIME_SECONDS" => 4,
        // lifecycle
        "INIT_SUCCEEDED" => 0,
        "INIT_FAILED" => 1,
        "INIT_PARAMETERS_INCORRECT" => 2,
        "REASON_PROGRAM" => 0,
        "REASON_REMOVE" => 1,
        "REASON_RECOMPILE" => 2,
        "REASON_CHARTCHANGE" => 3,
        "REASON_CHARTCLOSE" => 4,
        "REASON_PARAMETERS" => 5,
        "REASON_ACCOUNT" => 6,
        // chart events
        "CHARTEVENT_KEYDOWN" => 0,
        "CHARTEVENT_OBJECT_CLICK" => 1,
        "CHARTEVENT_CLICK" => 4,
        "CHARTEVENT_CUSTOM" => 1000,
        "CHARTEVENT_CUSTOM_LAST" => 66534,
        // drawing
        "DRAW_LINE" => 0,
        "DRAW_SECTION" => 1,
        "DRAW_HISTOGRAM" => 2,
        "DRAW_ARROW" => 3,
        "DRAW_ZIGZAG" => 4,
        "DRAW_NONE" => 12,
        "STYLE_SOLID" => 0,
        "STYLE_DASH" => 1,
        "STYLE_DOT" => 2,
        "STYLE_DASHDOT" => 3,
        "STYLE_DASHDOTDOT" => 4,
        "INDICATOR_DATA" => 0,
        "INDICATOR_COLOR_INDEX" => 1,
        "INDICATOR_CALCULATIONS" => 2,
        "INDICATOR_DIGITS" => 0,
        "INDICATOR_SHORTNAME" => 0,
        "INDICATOR_LEVELVALUE" => 1,
        // chart objects
        "OBJ_VLINE" => 0,
        "OBJ_HLINE" => 1,
        "OBJ_TREND" => 2,
        "OBJ_TRENDBYANGLE" => 3,
        "OBJ_REGRESSION" => 4,
        "OBJ_CHANNEL" => 5,
        "OBJ_STDDEVCHANNEL" => 6,
        "OBJ_FIBO" => 10,
        "OBJ_RECTANGLE" => 16,
        "OBJ_TRIANGLE" => 17,
        "OBJ_ELLIPSE" => 18,
        "OBJ_TEXT" => 21,
        "OBJ_ARROW" => 22,
        "OBJ_LABEL" => 23,
        "OBJ_BUTTON" => 25,
        "OBJ_RECTANGLE_LABEL" => 28,
        "OBJPROP_TIME" | "OBJPROP_TIME1" => 0,
        "OBJPROP_PRICE" | "OBJPROP_PRICE1" => 1,
        "OBJPROP_TIME2" => 2,
        "OBJPROP_PRICE2" => 3,
        "OBJPROP_TIME3" => 4,
        "OBJPROP_PRICE3" => 5,
        "OBJPROP_COLOR" => 6,
        "OBJPROP_STYLE" => 7,
        "OBJPROP_WIDTH" => 8,
        "OBJPROP_BACK" => 9,
        "OBJPROP_RAY" | "OBJPROP_RAY_RIGHT" => 10,
        "OBJPROP_ANGLE" => 13,
        "OBJPROP_ARROWCODE" => 14,
        "OBJPROP_TIMEFRAMES" => 15,
        "OBJPROP_FONTSIZE" => 100,
        "OBJPROP_CORNER" => 101,
        "OBJPROP_XDISTANCE" => 102,
        "OBJPROP_YDISTANCE" => 103,
        "OBJPROP_TEXT" => 999,
        "OBJPROP_FONT" => 1001,
        "OBJPROP_SELECTABLE" => 1000,
        "OBJPROP_ANCHOR" => 1011,
        "OBJPROP_TYPE" => 1018,
        "OBJPROP_NAME" => 1037,
        "CORNER_LEFT_UPPER" => 0,
        "CORNER_RIGHT_UPPER" => 1,
        "CORNER_LEFT_LOWER" => 2,
        "CORNER_RIGHT_LOWER" => 3,
        "ERR_OBJECT_ALREADY_EXISTS" => 4200,
        "ERR_OBJECT_DOES_NOT_EXIST" => 4202,
        // chart properties
        "CHART_MODE" => 0,
        "CHART_FOREGROUND" => 1,
        "CHART_SHIFT" => 2,
        "CHART_AUTOSCROLL" => 4,
        "CHART_SCALE" => 5,
        "CHART_COMMENT" => 20,
        "CHART_VISIBLE_BARS" => 100,
        "CHART_WINDOWS_TOTAL" => 101,
        "CHART_FIRST_VISIBLE_BAR" => 104,
        "CHART_WIDTH_IN_BARS" => 105,
        "CHART_WIDTH_IN_PIXELS" => 106,
        "CHART_HEIGHT_IN_PIXELS" => 107,
        "CHART_PRICE_MAX" => 108,
        "CHART_PRICE_MIN" => 109,
        // files
        "FILE_READ" => 1,
        "FILE_WRITE" => 2,
        "FILE_BIN" => 4,
        "FILE_CSV" => 8,
        "FILE_TXT" => 16,
        "FILE_ANSI" => 32,
        "FILE_UNICODE" => 64,
        "FILE_SHARE_READ" => 128,
        "FILE_SHARE_WRITE" => 256,
        "FILE_COMMON" => 4096,
        "INVALID_HANDLE" => -1,
        // misc
        "EMPTY" => -1,
        "WRONG_VALUE" => -1,
        "CLR_NONE" => -1,
        "WHOLE_ARRAY" => 0,
        "CHAR_MIN" => i8::MIN as i64,
        "CHAR_MAX" => i8::MAX as i64,
        "UCHAR_MAX" => u8::MAX as i64,
        "SHORT_MIN" => i16::MIN as i64,
        "SHORT_MAX" => i16::MAX as i64,
        "USHORT_MAX" => u16::MAX as i64,
        "INT_MIN" => i32::MIN as i64,
        "INT_MAX" => i32::MAX as i64,
        "UINT_MAX" => u32::MAX as i64,
        "LONG_MIN" => i64::MIN,
        "LONG_MAX" => i64::MAX,
        "ERR_NO_ERROR" => 0,
        "ERR_INVALID_TRADE_PARAMETERS" => 3,
        "ERR_INVALID_TICKET" => 4108,
        "ERR_UNKNOWN_SYMBOL" => 4106,
        "ERR_INVALID_FUNCTION_PARAMVALUE" => 4051,
        "ERR_GLOBAL_VARIABLE_NOT_FOUND" => 4058,
        // colors (0x00BBGGRR)
        "clrBlack" | "Black" => 0x000000,
        "clrWhite" | "White" => 0xFFFFFF,
        "clrRed" | "Red" => 0x0000FF,
        "clrGreen" | "Green" => 0x008000,
        "clrBlue" | "Blue" => 0xFF0000,
        "clrYellow" | "Yellow" => 0x00FFFF,
        "clrOrange" | "Orange" => 0x00A5FF,
        "clrGray" | "Gray" => 0x808080,
        "clrSilver" | "Silver" => 0xC0C0C0,
        "clrLime" | "Lime" => 0x00FF00,
        "clrAqua" | "Aqua" => 0xFFFF00,
        "clrMagenta" | "Magenta" => 0xFF00FF,
        "clrDodgerBlue" | "DodgerBlue" => 0xFF901E,
        "clrGold" | "Gold" => 0x00D7FF,
        "clrNavy" | "Navy" => 0x800000,
        "clrMaroon" | "Maroon" => 0x000080,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_constants_share_numbering() {
        assert_eq!(lookup("MODE_UPPER"), Some(Value::Int(1)));
        assert_eq!(lookup("MODE_LOWER"), Some(Value::Int(2)));
        assert_eq!(lookup("MODE_GATORLIPS"), Some(Value::Int(3)));
        assert_eq!(lookup("OP_SELLSTOP"), Some(Value::Int(5)));
    }

    #[test]
    fn empty_value_is_int_max() {
        assert_eq!(lookup("EMPTY_VALUE"), Some(Value::Double(2_147_483_647.0)));
        assert_eq!(lookup("NotAConstant"), None);
    }
}
