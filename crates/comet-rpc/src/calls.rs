//! Typed wrappers for the catalogued RPCs.
//!
//! Each method builds the request the controller expects, sends it through
//! [`CometClient::call`] and, where the reply has a useful shape, converts it
//! into a view. Status-code meanings come from the catalogue; check
//! [`crate::Error::fault`] on failure.

use comet_types::{IoType, PasteLineOper, RemarkLineOper};

use crate::client::CometClient;
use crate::error::{Result, ValidationError};
use crate::protocol::{ArgValue, RpcRequest};
use crate::schema::RpcReply;
use crate::transport::Transport;
use crate::views::{
    IoPortState, IoPortValue, PositionRegister, RawFile, RegisterValue, VariableValue,
};

/// Program that stands for every running task in PGABORT.
pub const ALL_TASKS: &str = "*ALL*";

/// Program name under which system variables live.
pub const SYSTEM_PROGRAM: &str = "*SYSTEM*";

/// Arguments for IOASGLOG: map a range of logical ports onto physical ones.
///
/// To delete a range, give only `log_port_type` and `first_log_port`; leave
/// the rest zero and `phy_port_type` as [`IoType::None`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoAssignment {
    pub log_port_type: IoType,
    pub first_log_port: u32,
    pub log_port_count: u32,
    pub rack: u32,
    pub slot: u32,
    pub phy_port_type: IoType,
    pub first_phy_port: u32,
}

impl IoAssignment {
    fn request(&self) -> RpcRequest {
        RpcRequest::new("IOASGLOG")
            .arg("log_port_type", self.log_port_type)
            .arg("fst_log_port", self.first_log_port)
            .arg("n_log_ports", self.log_port_count)
            .arg("rack_no", self.rack)
            .arg("slot_no", self.slot)
            .arg("phy_port_type", self.phy_port_type)
            .arg("fst_phy_port", self.first_phy_port)
    }
}

fn io_request(name: &str, io_type: IoType, index: u32) -> RpcRequest {
    RpcRequest::new(name)
        .arg("type", io_type)
        .arg("index", index)
}

fn value_str(reply: &RpcReply) -> Result<String> {
    reply.str("value").map(str::to_string).ok_or_else(|| {
        ValidationError::MissingField {
            field: "value".to_string(),
        }
        .into()
    })
}

impl<T: Transport> CometClient<T> {
    /// CHGOVRD: set the general speed override, in percent.
    ///
    /// # Errors
    ///
    /// Returns any call error.
    pub fn change_override(&self, percent: u8) -> Result<RpcReply> {
        self.call(&RpcRequest::new("CHGOVRD").arg("ovrd_val", percent))
    }

    /// DPREAD: read element `element` of dictionary `dict_name`.
    ///
    /// # Errors
    ///
    /// Fails with `Fault::DictNotFound` or `Fault::DictElementNotFound`.
    pub fn read_dict(&self, dict_name: &str, element: u32) -> Result<String> {
        let reply = self.call(
            &RpcRequest::new("DPREAD")
                .arg("dict_name", dict_name)
                .arg("ele_no", element),
        )?;
        value_str(&reply)
    }

    /// DPEWRITE_STR: the message text for an error code.
    ///
    /// # Errors
    ///
    /// Fails with `Fault::DictElementNotFound` for unknown codes.
    pub fn error_text(&self, code: u32) -> Result<String> {
        let reply = self.call(&RpcRequest::new("DPEWRITE_STR").arg("ercode", code))?;
        value_str(&reply)
    }

    /// CPKCL: run a KCL command. Whitespace in `command` is quoted for the
    /// wire.
    ///
    /// # Errors
    ///
    /// Returns any call error.
    pub fn exec_kcl(&self, command: &str) -> Result<RpcReply> {
        self.call(&RpcRequest::new("CPKCL").arg("kcl_cmd", command))
    }

    /// GET_RAW_FILE: fetch a file, e.g. `md:summary.dg`.
    ///
    /// # Errors
    ///
    /// Returns any call error.
    pub fn get_raw_file(&self, file: &str) -> Result<RawFile> {
        let reply = self.call(&RpcRequest::new("GET_RAW_FILE").arg("file", file))?;
        Ok(RawFile::try_from(&reply)?)
    }

    /// GTFILIST: list files matching `pattern`, e.g. `md:\*.ls`.
    ///
    /// # Errors
    ///
    /// Returns any call error.
    pub fn list_files(&self, pattern: &str) -> Result<String> {
        let reply = self.call(&RpcRequest::new("GTFILIST").arg("path_name", pattern))?;
        value_str(&reply)
    }

    /// GTMCRLST: the macro table.
    ///
    /// # Errors
    ///
    /// Returns any call error.
    pub fn list_macros(&self) -> Result<RpcReply> {
        self.call(&RpcRequest::new("GTMCRLST"))
    }

    /// GTPIDLST: position ids used in a TP program.
    ///
    /// # Errors
    ///
    /// Fails with `Fault::ProgramDoesNotExist`.
    pub fn list_position_ids(&self, program: &str) -> Result<RpcReply> {
        self.call(&RpcRequest::new("GTPIDLST").arg("prog_name", program.to_uppercase()))
    }

    /// IOASGLOG: create, change or delete an IO assignment. Takes effect
    /// after a controller restart.
    ///
    /// # Errors
    ///
    /// Fails with `Fault::NoSuchAssignment` or `Fault::AssignmentOverlaps`,
    /// reported through the reply's `asg_stat`.
    pub fn assign_io(&self, assignment: &IoAssignment) -> Result<RpcReply> {
        self.call(&assignment.request())
    }

    /// IOCKSIM: whether a port is simulated (`value` 1) or not.
    ///
    /// # Errors
    ///
    /// Fails with `Fault::InvalidIoType`, `Fault::InvalidIoIndex` or
    /// `Fault::NoPortsOfThisType`.
    pub fn is_io_simulated(&self, io_type: IoType, index: u32) -> Result<bool> {
        let reply = self.call(&io_request("IOCKSIM", io_type, index))?;
        Ok(IoPortValue::try_from(&reply)?.value != 0)
    }

    /// IODEFPN: set the comment on a port.
    ///
    /// # Errors
    ///
    /// Fails with `Fault::InvalidIoType` or `Fault::InvalidIoIndex`.
    pub fn set_io_comment(&self, io_type: IoType, index: u32, comment: &str) -> Result<RpcReply> {
        self.call(&io_request("IODEFPN", io_type, index).arg("comment", comment))
    }

    /// IODRYRUN: enter dry-run IO mode.
    ///
    /// # Errors
    ///
    /// Returns any call error.
    pub fn io_dry_run(&self) -> Result<RpcReply> {
        self.call(&RpcRequest::new("IODRYRUN"))
    }

    /// IOWETRUN: leave dry-run IO mode.
    ///
    /// # Errors
    ///
    /// Returns any call error.
    pub fn io_wet_run(&self) -> Result<RpcReply> {
        self.call(&RpcRequest::new("IOWETRUN"))
    }

    /// IOGETASG: assignments of one port type.
    ///
    /// # Errors
    ///
    /// Returns any call error.
    pub fn io_assignments(&self, io_type: IoType) -> Result<RpcReply> {
        self.call(&RpcRequest::new("IOGETASG").arg("type", io_type))
    }

    /// IOGETHDB: the IO hardware database.
    ///
    /// # Errors
    ///
    /// Returns any call error.
    pub fn io_hardware(&self) -> Result<RpcReply> {
        self.call(&RpcRequest::new("IOGETHDB"))
    }

    /// IOGETPN: the comment on a port.
    ///
    /// # Errors
    ///
    /// Fails with `Fault::InvalidIoType`, `Fault::InvalidIoIndex` or
    /// `Fault::NoCommentOnIoPort`.
    pub fn io_comment(&self, io_type: IoType, index: u32) -> Result<String> {
        let reply = self.call(&io_request("IOGETPN", io_type, index))?;
        value_str(&reply)
    }

    /// IOGTALL: state of `count` ports starting at `index`.
    ///
    /// The controller does not check `count` against what is configured; large
    /// counts return junk and load the controller.
    ///
    /// # Errors
    ///
    /// Fails with `Fault::InvalidIoType` or `Fault::InvalidIoIndex`.
    pub fn read_io_range(&self, io_type: IoType, index: u32, count: u32) -> Result<Vec<IoPortState>> {
        let reply = self.call(&io_request("IOGTALL", io_type, index).arg("cnt", count))?;
        Ok(IoPortState::list_from(&reply)?)
    }

    /// IOSIM: simulate a port.
    ///
    /// # Errors
    ///
    /// Fails with `Fault::InvalidIoType` or `Fault::InvalidIoIndex`.
    pub fn simulate_io(&self, io_type: IoType, index: u32) -> Result<IoPortValue> {
        let reply = self.call(&io_request("IOSIM", io_type, index))?;
        Ok(IoPortValue::try_from(&reply)?)
    }

    /// IOUNSIM: stop simulating a port.
    ///
    /// # Errors
    ///
    /// Fails with `Fault::InvalidIoType` or `Fault::InvalidIoIndex`.
    pub fn unsimulate_io(&self, io_type: IoType, index: u32) -> Result<RpcReply> {
        self.call(&io_request("IOUNSIM", io_type, index))
    }

    /// IOVALRD: read a port.
    ///
    /// # Errors
    ///
    /// Fails with `Fault::InvalidIoType` or `Fault::InvalidIoIndex`.
    pub fn read_io(&self, io_type: IoType, index: u32) -> Result<IoPortValue> {
        let reply = self.call(&io_request("IOVALRD", io_type, index))?;
        Ok(IoPortValue::try_from(&reply)?)
    }

    /// IOVALSET: write a port.
    ///
    /// # Errors
    ///
    /// Fails with `Fault::InvalidIoType` or `Fault::InvalidIoIndex`.
    pub fn write_io(&self, io_type: IoType, index: u32, value: i64) -> Result<RpcReply> {
        self.call(&io_request("IOVALSET", io_type, index).arg("value", value))
    }

    /// LOCAL_START: local start signal.
    ///
    /// # Errors
    ///
    /// Returns any call error.
    pub fn local_start(&self, value: i64) -> Result<RpcReply> {
        self.call(&RpcRequest::new("LOCAL_START").arg("value", value))
    }

    /// MMGETTYP: program type and attributes. The name is sent as given.
    ///
    /// # Errors
    ///
    /// Returns any call error.
    pub fn program_type(&self, program: &str) -> Result<RpcReply> {
        self.call(&RpcRequest::new("MMGETTYP").arg("prog_name", program))
    }

    /// PASTELIN: copy or cut lines `start..=end` and paste them after line
    /// `insert_after` (0 pastes at the top).
    ///
    /// # Errors
    ///
    /// Fails with `Fault::NoSuchLine` or `Fault::InvalidArgument`.
    pub fn paste_lines(
        &self,
        program: &str,
        start: u32,
        end: u32,
        insert_after: u32,
        oper: PasteLineOper,
    ) -> Result<RpcReply> {
        self.call(
            &RpcRequest::new("PASTELIN")
                .arg("prog_name", program.to_uppercase())
                .arg("start", start)
                .arg("end", end)
                .arg("insert", insert_after)
                .arg("opt_sw", oper),
        )
    }

    /// PGABORT: abort one task. The name is sent as given.
    ///
    /// # Errors
    ///
    /// Returns any call error.
    pub fn abort_program(&self, program: &str) -> Result<RpcReply> {
        self.call(&RpcRequest::new("PGABORT").arg("task_name", program))
    }

    /// PGABORT for every task.
    ///
    /// # Errors
    ///
    /// Returns any call error.
    pub fn abort_all(&self) -> Result<RpcReply> {
        self.abort_program(ALL_TASKS)
    }

    /// POSREGVALRD: read position register `index` of motion group `group`.
    ///
    /// # Errors
    ///
    /// Returns any call error.
    pub fn read_position_register(&self, index: u32, group: u8) -> Result<PositionRegister> {
        let reply = self.call(
            &RpcRequest::new("POSREGVALRD")
                .arg("grp_num", group)
                .arg("index", index),
        )?;
        Ok(PositionRegister::try_from(&reply)?)
    }

    /// REGVALRD: read numeric register `index`.
    ///
    /// # Errors
    ///
    /// Returns any call error.
    pub fn read_register(&self, index: u32) -> Result<RegisterValue> {
        let reply = self.call(&RpcRequest::new("REGVALRD").arg("index", index))?;
        Ok(RegisterValue::try_from(&reply)?)
    }

    /// REMARKLIN: comment out or restore lines `start..=end`.
    ///
    /// # Errors
    ///
    /// Fails with `Fault::InvalidArgument`.
    pub fn remark_lines(
        &self,
        program: &str,
        start: u32,
        end: u32,
        oper: RemarkLineOper,
    ) -> Result<RpcReply> {
        self.call(
            &RpcRequest::new("REMARKLIN")
                .arg("prog_name", program.to_uppercase())
                .arg("start", start)
                .arg("end", end)
                .arg("remark", oper),
        )
    }

    /// RPRINTF: append `line` to the controller's console log.
    ///
    /// # Errors
    ///
    /// Returns any call error.
    pub fn console_print(&self, line: &str) -> Result<RpcReply> {
        self.call(&RpcRequest::new("RPRINTF").anonymous(line))
    }

    /// SCGETPOS: position `index` of a TP program.
    ///
    /// # Errors
    ///
    /// Fails with `Fault::PositionDoesNotExist` or
    /// `Fault::ProgramDoesNotExist`.
    pub fn program_position(&self, program: &str, index: u32) -> Result<RpcReply> {
        self.call(
            &RpcRequest::new("SCGETPOS")
                .arg("prog_name", program.to_uppercase())
                .arg("pos_idx", index),
        )
    }

    /// TXCHGPRG: open a program on the teach pendant.
    ///
    /// # Errors
    ///
    /// Fails with `Fault::ProgramDoesNotExist`.
    pub fn open_program(&self, program: &str) -> Result<RpcReply> {
        self.call(&RpcRequest::new("TXCHGPRG").arg("prog_name", program.to_uppercase()))
    }

    /// TXML_CURANG: current joint angles of a motion group.
    ///
    /// # Errors
    ///
    /// Returns any call error.
    pub fn current_joint_angles(&self, group: u8) -> Result<String> {
        let reply = self.call(&RpcRequest::new("TXML_CURANG").arg("grp_num", group))?;
        value_str(&reply)
    }

    /// TXML_CURPOS: current pose of a motion group. The controller's default
    /// `pos_type` is 6.
    ///
    /// # Errors
    ///
    /// Returns any call error.
    pub fn current_position(&self, pos_rep: i32, pos_type: i32, group: u8) -> Result<String> {
        let reply = self.call(
            &RpcRequest::new("TXML_CURPOS")
                .arg("pos_rep", pos_rep)
                .arg("pos_type", pos_type)
                .arg("grp_num", group),
        )?;
        value_str(&reply)
    }

    /// TXSETLIN: open a TP program with the cursor on `line` (1-based).
    ///
    /// # Errors
    ///
    /// Returns any call error.
    pub fn set_program_line(&self, program: &str, line: u32) -> Result<RpcReply> {
        self.call(
            &RpcRequest::new("TXSETLIN")
                .arg("prog_name", program.to_uppercase())
                .arg("line_num", line),
        )
    }

    /// VMIP_READVA: read a variable. Use [`SYSTEM_PROGRAM`] for system
    /// variables.
    ///
    /// # Errors
    ///
    /// Fails with `Fault::UnknownVariable`, `Fault::NoDataDefinedForProgram`
    /// or `Fault::BadVariableOrRegisterIndex`.
    pub fn read_variable(&self, program: &str, variable: &str) -> Result<VariableValue> {
        let reply = self.call(
            &RpcRequest::new("VMIP_READVA")
                .arg("prog_name", program.to_uppercase())
                .arg("var_name", variable.to_uppercase()),
        )?;
        Ok(VariableValue::try_from(&reply)?)
    }

    /// VMIP_WRITEVA: write a variable. The controller parses the value from
    /// its text form, the same as in a `.VA` file.
    ///
    /// # Errors
    ///
    /// Fails with the same faults as [`Self::read_variable`], plus
    /// `Fault::BadElementInStructure`.
    pub fn write_variable(
        &self,
        program: &str,
        variable: &str,
        value: impl Into<ArgValue>,
    ) -> Result<RpcReply> {
        self.call(
            &RpcRequest::new("VMIP_WRITEVA")
                .arg("prog_name", program.to_uppercase())
                .arg("var_name", variable.to_uppercase())
                .arg("value", value),
        )
    }
}
