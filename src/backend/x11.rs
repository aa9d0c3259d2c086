//! RandR backend for a live X server
//!
//! Talks to the RandR extension (version 1.3 or newer) through `x11rb`.
//! Monitor identities come from the EDID output property; only the vendor,
//! product and serial fields of the EDID header are read.

use tracing::{debug, info, trace};
use x11rb::connection::Connection;
use x11rb::protocol::randr::{self, ConnectionExt as _};
use x11rb::protocol::xproto::{self, ConnectionExt as _};
use x11rb::rust_connection::RustConnection;

use super::{CrtcConfig, GammaRamp, RandrBackend, Resources};
use crate::error::{RandrError, Result};
use crate::screen::{unknown_vendor, Crtc, CrtcId, Mode, ModeId, Output, OutputId, Rotation, SizeRange};

const MIN_MAJOR: u32 = 1;
const MIN_MINOR: u32 = 3;

/// Output properties that may hold the EDID, newest name first
const EDID_PROPERTIES: [&[u8]; 3] = [b"EDID", b"EDID_DATA", b"XFree86_DDC_EDID1_RAWDATA"];

fn backend_error(e: impl std::fmt::Display) -> RandrError {
    RandrError::Backend(e.to_string())
}

fn query_error(e: impl std::fmt::Display) -> RandrError {
    RandrError::Query(e.to_string())
}

/// Vendor code, product and serial from an EDID header
///
/// Returns `None` for blobs too short to hold the header.
pub fn decode_edid_identity(edid: &[u8]) -> Option<(String, u16, u32)> {
    let header = edid.get(8..16)?;

    let packed = u16::from_be_bytes([header[0], header[1]]);
    let vendor: String = [10, 5, 0]
        .iter()
        .map(|shift| char::from(b'A' - 1 + ((packed >> shift) & 0x1f) as u8))
        .collect();
    let product = u16::from_le_bytes([header[2], header[3]]);
    let serial = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

    Some((vendor, product, serial))
}

/// Refresh rate in milli-Hertz
fn mode_frequency(mode: &randr::ModeInfo) -> u32 {
    let total = u64::from(mode.htotal) * u64::from(mode.vtotal);
    if total == 0 {
        return 0;
    }
    u32::try_from(u64::from(mode.dot_clock) * 1000 / total).unwrap_or(u32::MAX)
}

/// RandR on an X display
pub struct X11Backend {
    conn: RustConnection,
    root: xproto::Window,
    config_timestamp: u32,
}

impl X11Backend {
    /// Connect to `display`, or to `$DISPLAY` when `None`
    ///
    /// # Errors
    ///
    /// `BackendUnavailable` when the display cannot be opened.
    pub fn connect(display: Option<&str>) -> Result<Self> {
        let (conn, screen_num) = RustConnection::connect(display).map_err(|e| {
            RandrError::BackendUnavailable {
                reason: format!("cannot open display: {e}"),
            }
        })?;
        let root = conn
            .setup()
            .roots
            .get(screen_num)
            .map(|screen| screen.root)
            .ok_or_else(|| RandrError::BackendUnavailable {
                reason: format!("display has no screen {screen_num}"),
            })?;

        info!("Connected to X display, screen {screen_num}");

        Ok(Self {
            conn,
            root,
            config_timestamp: 0,
        })
    }

    fn atom(&self, name: &[u8]) -> Result<Option<xproto::Atom>> {
        let atom = self
            .conn
            .intern_atom(true, name)
            .map_err(query_error)?
            .reply()
            .map_err(query_error)?
            .atom;
        Ok((atom != x11rb::NONE).then_some(atom))
    }

    fn output_property(&self, output: randr::Output, property: xproto::Atom) -> Option<randr::GetOutputPropertyReply> {
        self.conn
            .randr_get_output_property(output, property, x11rb::NONE, 0, 256, false, false)
            .ok()?
            .reply()
            .ok()
            .filter(|reply| !reply.data.is_empty())
    }

    fn edid(&self, output: randr::Output) -> Result<Option<Vec<u8>>> {
        for name in EDID_PROPERTIES {
            let Some(atom) = self.atom(name)? else {
                continue;
            };
            if let Some(reply) = self.output_property(output, atom) {
                if reply.format == 8 {
                    return Ok(Some(reply.data));
                }
            }
        }
        Ok(None)
    }

    fn connector_type(&self, output: randr::Output) -> Result<Option<String>> {
        let Some(property) = self.atom(b"ConnectorType")? else {
            return Ok(None);
        };
        let Some(reply) = self.output_property(output, property) else {
            return Ok(None);
        };
        if reply.type_ != u32::from(xproto::AtomEnum::ATOM) || reply.format != 32 || reply.data.len() < 4 {
            return Ok(None);
        }

        let atom = u32::from_ne_bytes([reply.data[0], reply.data[1], reply.data[2], reply.data[3]]);
        let name = self
            .conn
            .get_atom_name(atom)
            .map_err(query_error)?
            .reply()
            .map_err(query_error)?
            .name;
        Ok(Some(String::from_utf8_lossy(&name).into_owned()))
    }

    fn output(&self, id: randr::Output, primary: randr::Output) -> Result<Output> {
        let reply = self
            .conn
            .randr_get_output_info(id, self.config_timestamp)
            .map_err(query_error)?
            .reply()
            .map_err(query_error)?;

        let connected = reply.connection == randr::Connection::CONNECTED;
        let (vendor, product, serial) = if connected {
            self.edid(id)?
                .and_then(|edid| decode_edid_identity(&edid))
                .unwrap_or_else(|| (unknown_vendor(), 0, 0))
        } else {
            (unknown_vendor(), 0, 0)
        };

        Ok(Output {
            id: OutputId(id),
            name: String::from_utf8_lossy(&reply.name).into_owned(),
            connected,
            width_mm: reply.mm_width,
            height_mm: reply.mm_height,
            vendor,
            product,
            serial,
            connector_type: self.connector_type(id)?,
            possible_crtcs: reply.crtcs.iter().copied().map(CrtcId).collect(),
            clones: reply.clones.iter().copied().map(OutputId).collect(),
            modes: reply.modes.iter().copied().map(ModeId).collect(),
            n_preferred: usize::from(reply.num_preferred),
            crtc: (reply.crtc != x11rb::NONE).then_some(CrtcId(reply.crtc)),
            is_primary: id == primary,
        })
    }

    fn crtc(&self, id: randr::Crtc) -> Result<Crtc> {
        let reply = self
            .conn
            .randr_get_crtc_info(id, self.config_timestamp)
            .map_err(query_error)?
            .reply()
            .map_err(query_error)?;
        let gamma_size = self
            .conn
            .randr_get_crtc_gamma_size(id)
            .map_err(query_error)?
            .reply()
            .map_err(query_error)?
            .size;

        Ok(Crtc {
            id: CrtcId(id),
            current_mode: (reply.mode != x11rb::NONE).then_some(ModeId(reply.mode)),
            x: i32::from(reply.x),
            y: i32::from(reply.y),
            current_rotation: Rotation::from_bits_truncate(u16::from(reply.rotation) as u8),
            rotations: Rotation::from_bits_truncate(u16::from(reply.rotations) as u8),
            possible_outputs: reply.possible.iter().copied().map(OutputId).collect(),
            current_outputs: reply.outputs.iter().copied().map(OutputId).collect(),
            gamma_size: u32::from(gamma_size),
        })
    }
}

impl RandrBackend for X11Backend {
    fn name(&self) -> &'static str {
        "x11"
    }

    fn check_version(&mut self) -> Result<()> {
        let reply = self
            .conn
            .randr_query_version(MIN_MAJOR, MIN_MINOR)
            .map_err(|e| RandrError::BackendUnavailable { reason: e.to_string() })?
            .reply()
            .map_err(|e| RandrError::BackendUnavailable { reason: e.to_string() })?;

        if (reply.major_version, reply.minor_version) < (MIN_MAJOR, MIN_MINOR) {
            return Err(RandrError::BackendUnavailable {
                reason: format!(
                    "server supports RANDR {}.{}, {MIN_MAJOR}.{MIN_MINOR} required",
                    reply.major_version, reply.minor_version
                ),
            });
        }

        debug!("RANDR {}.{}", reply.major_version, reply.minor_version);
        Ok(())
    }

    fn query_resources(&mut self, reprobe: bool) -> Result<Resources> {
        let range = self
            .conn
            .randr_get_screen_size_range(self.root)
            .map_err(query_error)?
            .reply()
            .map_err(query_error)?;

        let (timestamp, config_timestamp, crtcs, outputs, mode_infos, names) = if reprobe {
            let r = self
                .conn
                .randr_get_screen_resources(self.root)
                .map_err(query_error)?
                .reply()
                .map_err(query_error)?;
            (r.timestamp, r.config_timestamp, r.crtcs, r.outputs, r.modes, r.names)
        } else {
            let r = self
                .conn
                .randr_get_screen_resources_current(self.root)
                .map_err(query_error)?
                .reply()
                .map_err(query_error)?;
            (r.timestamp, r.config_timestamp, r.crtcs, r.outputs, r.modes, r.names)
        };
        self.config_timestamp = config_timestamp;

        let primary = self
            .conn
            .randr_get_output_primary(self.root)
            .map_err(query_error)?
            .reply()
            .map_err(query_error)?
            .output;

        let mut modes = Vec::with_capacity(mode_infos.len());
        let mut offset = 0usize;
        for info in &mode_infos {
            let end = offset + usize::from(info.name_len);
            let name = names
                .get(offset..end)
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                .unwrap_or_default();
            offset = end;

            modes.push(Mode {
                id: ModeId(info.id),
                name,
                width: u32::from(info.width),
                height: u32::from(info.height),
                freq: mode_frequency(info),
            });
        }

        let outputs = outputs
            .iter()
            .map(|id| self.output(*id, primary))
            .collect::<Result<Vec<_>>>()?;
        let crtcs = crtcs
            .iter()
            .map(|id| self.crtc(*id))
            .collect::<Result<Vec<_>>>()?;

        trace!(
            "x11: {} outputs, {} CRTCs, {} modes (reprobe={reprobe})",
            outputs.len(),
            crtcs.len(),
            modes.len()
        );

        Ok(Resources {
            timestamp,
            config_timestamp,
            size_range: SizeRange {
                min_width: i32::from(range.min_width),
                max_width: i32::from(range.max_width),
                min_height: i32::from(range.min_height),
                max_height: i32::from(range.max_height),
            },
            outputs,
            crtcs,
            modes,
            primary: (primary != x11rb::NONE).then_some(OutputId(primary)),
        })
    }

    fn set_crtc_config(&mut self, crtc: CrtcId, timestamp: u32, config: &CrtcConfig) -> Result<()> {
        let outputs: Vec<randr::Output> = config.outputs.iter().map(|o| o.0).collect();
        let x = i16::try_from(config.x).map_err(backend_error)?;
        let y = i16::try_from(config.y).map_err(backend_error)?;

        let reply = self
            .conn
            .randr_set_crtc_config(
                crtc.0,
                timestamp,
                self.config_timestamp,
                x,
                y,
                config.mode.map_or(x11rb::NONE, |mode| mode.0),
                randr::Rotation::from(u16::from(config.rotation.bits())),
                &outputs,
            )
            .map_err(backend_error)?
            .reply()
            .map_err(backend_error)?;

        if reply.status != randr::SetConfig::SUCCESS {
            return Err(RandrError::Backend(format!(
                "could not set the configuration for CRTC {crtc}: {:?}",
                reply.status
            )));
        }
        Ok(())
    }

    fn set_screen_size(&mut self, width: i32, height: i32, width_mm: i32, height_mm: i32) -> Result<()> {
        let width = u16::try_from(width).map_err(backend_error)?;
        let height = u16::try_from(height).map_err(backend_error)?;
        let width_mm = u32::try_from(width_mm).map_err(backend_error)?;
        let height_mm = u32::try_from(height_mm).map_err(backend_error)?;

        self.conn
            .randr_set_screen_size(self.root, width, height, width_mm, height_mm)
            .map_err(backend_error)?
            .check()
            .map_err(backend_error)
    }

    fn set_primary(&mut self, output: Option<OutputId>) -> Result<()> {
        self.conn
            .randr_set_output_primary(self.root, output.map_or(x11rb::NONE, |o| o.0))
            .map_err(backend_error)?
            .check()
            .map_err(backend_error)
    }

    fn grab(&mut self) -> Result<()> {
        self.conn
            .grab_server()
            .map_err(backend_error)?
            .check()
            .map_err(backend_error)
    }

    fn ungrab(&mut self) -> Result<()> {
        self.conn
            .ungrab_server()
            .map_err(backend_error)?
            .check()
            .map_err(backend_error)
    }

    fn crtc_gamma(&mut self, crtc: CrtcId) -> Result<GammaRamp> {
        let reply = self
            .conn
            .randr_get_crtc_gamma(crtc.0)
            .map_err(backend_error)?
            .reply()
            .map_err(backend_error)?;
        Ok(GammaRamp {
            red: reply.red,
            green: reply.green,
            blue: reply.blue,
        })
    }

    fn set_crtc_gamma(&mut self, crtc: CrtcId, ramp: &GammaRamp) -> Result<()> {
        self.conn
            .randr_set_crtc_gamma(crtc.0, &ramp.red, &ramp.green, &ramp.blue)
            .map_err(backend_error)?
            .check()
            .map_err(backend_error)
    }
}
