/// Composite cache key for families keyed by more than one dimension.
///
/// Fields a family does not use stay `None`, so equality always covers every
/// field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct MeterKey {
    pub uri: Option<String>,
    pub remote_address: Option<String>,
    pub method: Option<String>,
    pub status: Option<String>,
}

impl MeterKey {
    pub fn new(
        uri: Option<&str>,
        remote_address: Option<&str>,
        method: Option<&str>,
        status: Option<&str>,
    ) -> Self {
        Self {
            uri: uri.map(str::to_owned),
            remote_address: remote_address.map(str::to_owned),
            method: method.map(str::to_owned),
            status: status.map(str::to_owned),
        }
    }
}
