//! AT commands used by the tracker and the replies they are acknowledged by

/// Generic acknowledgement
pub const OK: &str = "OK";
/// Generic failure marker
pub const ERROR: &str = "ERROR";
/// Prompt the modem prints before accepting raw socket bytes
pub const SEND_PROMPT: &str = ">";

pub const GNSS_POWER_ON: &str = "AT+CGNSPWR=1";
pub const GNSS_POWER_OFF: &str = "AT+CGNSPWR=0";
pub const GNSS_INFO: &str = "AT+CGNSINF";

pub const REGISTRATION_QUERY: &str = "AT+CEREG?";
/// Registered, roaming
pub const REGISTERED: &str = "+CEREG: 0,5";

pub const PREFER_LTE: &str = "AT+CNMP=38";
pub const PREFER_CATM1: &str = "AT+CMNB=1";
pub const DEACTIVATE_PDP: &str = "AT+CNACT=0,0";
pub const ACTIVATE_PDP: &str = "AT+CNACT=0,1";
pub const PDP_STATUS: &str = "AT+CNACT?";
pub const NETWORK_APN: &str = "AT+CGNAPN";
pub const SIGNAL_QUALITY: &str = "AT+CSQ";
pub const OPERATOR: &str = "AT+COPS?";
pub const IMEI: &str = "AT+GSN";

pub const CLOSE_SOCKET: &str = "AT+CACLOSE=0";
/// Read up to 100 pending bytes from socket 0
pub const RECEIVE: &str = "AT+CARECV=0,100";

/// Define PDP context 1 on `apn`
pub fn define_pdp(apn: &str) -> String {
    format!("AT+CGDCONT=1,\"IP\",\"{}\"", apn)
}

/// Bind PDP index 0 to `apn`
pub fn configure_pdp(apn: &str) -> String {
    format!("AT+CNCFG=0,1,\"{}\"", apn)
}

/// Open TCP socket 0 on PDP index 0
pub fn open_tcp(host: &str, port: u16) -> String {
    format!("AT+CAOPEN=0,0,\"TCP\",\"{}\",{}", host, port)
}

/// Announce `len` raw bytes on socket 0
pub fn send_length(len: usize) -> String {
    format!("AT+CASEND=0,{}", len)
}
