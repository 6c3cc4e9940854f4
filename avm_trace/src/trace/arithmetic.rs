use super::{set_register, AvmTraceBuilder};
use crate::errors::AvmError;
use crate::instruction::ArithmeticOp;
use crate::memory::{IntermRegister, MemoryTag};
use crate::util::{ff_inverse_or_zero, FF};

impl AvmTraceBuilder {
    /// ADD, SUB, MUL, DIV, FDIV, EQ, LT and LTE.
    ///
    /// The tag of `a` is the instruction tag: `b` must carry the same one.
    /// Comparisons write a U1, every other operation writes a value of the
    /// instruction tag.
    pub(super) fn op_arithmetic(
        &mut self,
        op: ArithmeticOp,
        indirect: u8,
        a_offset: u32,
        b_offset: u32,
        dst_offset: u32,
    ) -> AvmError {
        let clk = self.next_clk();
        let opcode = op.opcode();
        let mut row = self.new_row(clk, opcode);

        let ([a_addr, b_addr, dst_addr], mut error) =
            self.resolve(indirect.into(), [a_offset, b_offset, dst_offset], clk);

        let in_tag = self.mem.unconstrained_read(self.call_ptr, a_addr.direct).tag;
        let out_tag = if op.is_comparison() {
            MemoryTag::U1
        } else {
            in_tag
        };

        let a = self.constrained_read(clk, IntermRegister::Ia, a_addr, in_tag, out_tag);
        let b = self.constrained_read(clk, IntermRegister::Ib, b_addr, in_tag, out_tag);
        if !(a.tag_match && b.tag_match) {
            error = error.or(AvmError::TagError);
        }
        match op {
            ArithmeticOp::Div if !in_tag.is_integral() => error = error.or(AvmError::TagError),
            ArithmeticOp::FDiv if in_tag != MemoryTag::FF => error = error.or(AvmError::TagError),
            _ => {}
        }

        let zero = FF::from(0u64);
        if matches!(op, ArithmeticOp::Div | ArithmeticOp::FDiv) && b.val == zero {
            error = error.or(AvmError::DivisionByZero);
        }

        let c = if error.is_ok() {
            match op {
                ArithmeticOp::Add => self.alu.op_add(a.val, b.val, in_tag, clk),
                ArithmeticOp::Sub => self.alu.op_sub(a.val, b.val, in_tag, clk),
                ArithmeticOp::Mul => self.alu.op_mul(a.val, b.val, in_tag, clk),
                ArithmeticOp::Div => self.alu.op_div(a.val, b.val, in_tag, clk),
                ArithmeticOp::FDiv => a.val * ff_inverse_or_zero(b.val),
                ArithmeticOp::Eq => self.alu.op_eq(a.val, b.val, in_tag, clk),
                ArithmeticOp::Lt => self.alu.op_lt(a.val, b.val, in_tag, clk),
                ArithmeticOp::Lte => self.alu.op_lte(a.val, b.val, in_tag, clk),
            }
        } else {
            zero
        };

        // FDIV is checked in the main trace: `ia = ib * ic` with `ib * inv = 1`.
        if op == ArithmeticOp::FDiv {
            row.main_inv = ff_inverse_or_zero(b.val);
        }

        let c = self.constrained_write(clk, IntermRegister::Ic, dst_addr, c, in_tag, out_tag);

        set_register(&mut row, IntermRegister::Ia, &a);
        set_register(&mut row, IntermRegister::Ib, &b);
        set_register(&mut row, IntermRegister::Ic, &c);
        row.main_r_in_tag = in_tag.as_ff();
        row.main_w_in_tag = out_tag.as_ff();
        if opcode.is_alu() {
            row.main_alu_in_tag = in_tag.as_ff();
        }

        self.finish(row, opcode, error, 0)
    }
}
